//! Authenticated request pipeline
//!
//! Every API call goes through [`ApiClient::request`], which:
//! 1. Attaches JSON, bearer and CSRF headers as the call requires
//! 2. Reports the call to the [`Notifier`] while it is in flight
//! 3. On an expired session, refreshes the token pair and re-issues the
//!    call, at most `retry_limit` times per logical request
//! 4. Maps the outcome to a decoded value or an [`ApiError`]

mod error;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::models::{ErrorResponse, RefreshRequest, RefreshResponse};
use crate::api::REFRESH_PATH;
use crate::config::ApiConfig;
use crate::json::{to_parameters, Parameters};
use crate::notify::Notifier;
use crate::store::CredentialStore;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use crate::ClientError;

/// Backend message meaning the access token has expired
pub const TOKEN_EXPIRED_MESSAGE: &str = "Время действия токена истекло";

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

/// Result of a single exchange, before interpretation
type Exchange = Result<HttpResponse, TransportError>;

/// One API call, built per request
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub path: String,
    pub method: Method,
    pub parameters: Option<Parameters>,
    pub needs_auth: bool,
    pub needs_csrf: bool,
}

impl RequestSpec {
    /// Authenticated, without CSRF, no parameters
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            parameters: None,
            needs_auth: true,
            needs_csrf: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn parameters(mut self, parameters: Option<Parameters>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Use a serializable payload as the parameters
    pub fn payload<T: Serialize>(self, payload: &T) -> Self {
        self.parameters(to_parameters(payload))
    }

    pub fn auth(mut self, needs_auth: bool) -> Self {
        self.needs_auth = needs_auth;
        self
    }

    pub fn csrf(mut self, needs_csrf: bool) -> Self {
        self.needs_csrf = needs_csrf;
        self
    }
}

/// Token refresh progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    Refreshed,
    Failed,
}

/// Marks a request as in flight for as long as it lives
struct InFlight<'a> {
    notifier: &'a dyn Notifier,
}

impl<'a> InFlight<'a> {
    fn start(notifier: &'a dyn Notifier) -> Self {
        notifier.request_started();
        Self { notifier }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.notifier.request_finished();
    }
}

/// HTTP client that manages credentials on the caller's behalf
pub struct ApiClient {
    base_url: Url,
    timeout: Duration,
    retry_limit: u32,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    /// Create a new client
    pub fn new(
        config: &ApiConfig,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let client = Self {
            base_url: config.base_url()?,
            timeout: config.timeout(),
            retry_limit: config.retry_limit,
            transport,
            credentials,
            notifier,
        };
        client.restore_csrf_cookie();
        Ok(client)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a request and decode a 2xx body as `T`
    pub async fn request<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T, ApiError> {
        self.request_with_cancel(spec, &CancellationToken::new()).await
    }

    /// Like [`request`](Self::request), abandoning the call once `cancel`
    /// fires. The retry count lives in this call alone.
    pub async fn request_with_cancel<T: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let mut attempt = 0;

        loop {
            let exchange = self.execute(spec, attempt, cancel).await;

            if attempt < self.retry_limit && session_expired(&exchange) {
                tracing::info!(path = %spec.path, attempt, "session expired, refreshing token");

                match self.refresh_with_cancel(cancel).await {
                    RefreshState::Refreshed => {
                        attempt += 1;
                        continue;
                    }
                    _ if cancel.is_cancelled() => {
                        return Err(ApiError::Transport(TransportError::Cancelled));
                    }
                    _ => return Err(ApiError::Unauthorized),
                }
            }

            return self.resolve(exchange);
        }
    }

    /// Exchange the stored refresh token for a new token pair
    pub async fn refresh_session(&self) -> RefreshState {
        self.refresh_with_cancel(&CancellationToken::new()).await
    }

    async fn refresh_with_cancel(&self, cancel: &CancellationToken) -> RefreshState {
        let mut state = RefreshState::Idle;

        let refresh_token = self.credentials.refresh_token();
        if refresh_token.is_empty() {
            tracing::warn!(?state, "no refresh token stored, cannot refresh");
            return RefreshState::Failed;
        }

        state = RefreshState::Refreshing;
        tracing::debug!(?state, "refreshing access token");

        let spec = RequestSpec::post(REFRESH_PATH)
            .payload(&RefreshRequest { refresh_token })
            .auth(true)
            .csrf(true);

        // The refresh call is never itself refreshed.
        let exchange = self.execute(&spec, 0, cancel).await;
        let resp = match self.resolve::<RefreshResponse>(exchange) {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                return RefreshState::Failed;
            }
        };

        let Some(tokens) = resp.tokens else {
            tracing::warn!("token refresh returned no tokens");
            return RefreshState::Failed;
        };

        let access_token = tokens.access_token.unwrap_or_default();
        if access_token.is_empty() {
            tracing::warn!("token refresh returned an empty access token");
            return RefreshState::Failed;
        }

        if let Err(e) = self.credentials.set_access_token(&access_token) {
            tracing::error!(error = %e, "failed to store refreshed access token");
            return RefreshState::Failed;
        }

        if let Some(new_refresh) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            if let Err(e) = self.credentials.set_refresh_token(&new_refresh) {
                tracing::error!(error = %e, "failed to store refreshed refresh token");
                return RefreshState::Failed;
            }
            tracing::debug!("updated refresh token");
        }

        self.sync_csrf_from_cookies();

        state = RefreshState::Refreshed;
        tracing::info!(?state, "access token refreshed");
        state
    }

    /// The `csrftoken` cookie the jar holds for the API host
    pub fn csrf_cookie(&self) -> Option<String> {
        self.transport
            .cookies(&self.base_url)
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(CSRF_COOKIE))
            .map(|(_, value)| value)
    }

    /// Seed the jar with the stored CSRF token. The header is only accepted
    /// alongside the matching cookie, and the jar starts empty.
    fn restore_csrf_cookie(&self) {
        if self.csrf_cookie().is_some() {
            return;
        }
        let token = self.credentials.csrf_token();
        if !token.is_empty() {
            self.transport.add_cookie(&self.base_url, CSRF_COOKIE, &token);
            tracing::debug!("restored csrf cookie from store");
        }
    }

    /// Copy the `csrftoken` cookie for the API host into the credential store
    pub fn sync_csrf_from_cookies(&self) {
        if let Some(value) = self.csrf_cookie() {
            if let Err(e) = self.credentials.set_csrf_token(&value) {
                tracing::warn!(error = %e, "failed to store csrf token");
            } else {
                tracing::trace!("csrf token synchronized from cookies");
            }
        }
    }

    fn headers(&self, needs_auth: bool, needs_csrf: bool) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];

        if needs_auth {
            let token = self.credentials.access_token();
            if !token.is_empty() {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
        }

        if needs_csrf {
            self.sync_csrf_from_cookies();
            let csrf = self.credentials.csrf_token();
            if !csrf.is_empty() {
                headers.push((CSRF_HEADER.to_string(), csrf));
            }
        }

        headers
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| TransportError::InvalidRequest(format!("{raw}: {e}")))
    }

    /// Send one attempt of `spec`
    async fn execute(&self, spec: &RequestSpec, attempt: u32, cancel: &CancellationToken) -> Exchange {
        let url = self.endpoint_url(&spec.path)?;
        let request = HttpRequest {
            method: spec.method,
            url,
            headers: self.headers(spec.needs_auth, spec.needs_csrf),
            parameters: spec.parameters.clone(),
            timeout: self.timeout,
        };

        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt,
            "sending request"
        );

        let _in_flight = InFlight::start(self.notifier.as_ref());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.transport.send(request) => result,
        };

        match &result {
            Ok(resp) => tracing::debug!(
                path = %spec.path,
                status = resp.status,
                bytes = resp.body.len(),
                "received response"
            ),
            Err(e) => tracing::debug!(path = %spec.path, error = %e, "request failed"),
        }

        result
    }

    /// Turn a final exchange into the caller's result
    fn resolve<T: DeserializeOwned>(&self, exchange: Exchange) -> Result<T, ApiError> {
        match exchange {
            Ok(resp) if resp.is_success() => decode(&resp.body),
            Ok(resp) => {
                if let Some(message) = backend_message(&resp.body) {
                    return Err(self.surface(message));
                }
                Err(ApiError::from_status(resp.status, resp.body))
            }
            Err(e) => {
                if let Some(message) = e.partial_body().and_then(backend_message) {
                    return Err(self.surface(message));
                }
                Err(ApiError::Transport(e))
            }
        }
    }

    fn surface(&self, message: String) -> ApiError {
        tracing::warn!(message = %message, "backend reported an error");
        self.notifier.show_message(&message);
        ApiError::Backend(message)
    }
}

/// Whether the exchange says the access token is no longer valid
fn session_expired(exchange: &Exchange) -> bool {
    let body = match exchange {
        Ok(resp) if resp.status == 401 => return true,
        Ok(resp) => Some(resp.body.as_slice()),
        Err(e) => e.partial_body(),
    };

    body.and_then(|b| serde_json::from_slice::<ErrorResponse>(b).ok())
        .and_then(|err| err.first_error().map(is_token_expired_message))
        .unwrap_or(false)
}

fn is_token_expired_message(message: &str) -> bool {
    message
        .to_lowercase()
        .contains(&TOKEN_EXPIRED_MESSAGE.to_lowercase())
}

/// First non-empty message of an error envelope
fn backend_message(body: &[u8]) -> Option<String> {
    let err: ErrorResponse = serde_json::from_slice(body).ok()?;
    err.first_error()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "failed to decode response body");
        ApiError::Decoding(e)
    })
}
