//! Session endpoints: CSRF bootstrap, register, login, userinfo, logout

use super::models::{
    ApiMessage, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UserInfoResponse,
};
use super::{CSRF_PATH, LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH, USER_INFO_PATH};
use crate::client::{ApiClient, ApiError, RequestSpec};

impl ApiClient {
    /// Bootstrap the CSRF cookie. Must run before login or register on a
    /// fresh cookie jar.
    pub async fn fetch_csrf_token(&self) -> Result<ApiMessage, ApiError> {
        let spec = RequestSpec::get(CSRF_PATH).auth(false).csrf(false);
        let result = self.request(&spec).await;
        // The cookie is set even when the body is not what we expect.
        self.sync_csrf_from_cookies();
        result
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let spec = RequestSpec::post(REGISTER_PATH)
            .payload(req)
            .auth(false)
            .csrf(true);
        self.request(&spec).await
    }

    /// Log in and store the returned token pair
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let spec = RequestSpec::post(LOGIN_PATH)
            .payload(req)
            .auth(false)
            .csrf(true);
        let resp: LoginResponse = self.request(&spec).await?;

        match &resp.tokens {
            Some(tokens) => {
                if let Err(e) = self
                    .credentials()
                    .set_tokens(&tokens.access_token, &tokens.refresh_token)
                {
                    tracing::error!(error = %e, "failed to store login tokens");
                } else {
                    tracing::info!(username = %req.username, "logged in");
                }
            }
            None => tracing::warn!(username = %req.username, "login response carried no tokens"),
        }

        Ok(resp)
    }

    pub async fn user_info(&self) -> Result<UserInfoResponse, ApiError> {
        let spec = RequestSpec::get(USER_INFO_PATH).auth(true).csrf(false);
        self.request(&spec).await
    }

    /// Log out on the server and forget the local session. The tokens are
    /// dropped whatever the server answers.
    pub async fn logout(&self) -> Result<ApiMessage, ApiError> {
        let spec = RequestSpec::post(LOGOUT_PATH).auth(true).csrf(true);
        let result = self.request(&spec).await;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "server logout failed, clearing local session anyway");
        }
        if let Err(e) = self.credentials().clear_session() {
            tracing::error!(error = %e, "failed to clear session tokens");
        }

        result
    }
}
