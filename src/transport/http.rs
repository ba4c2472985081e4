//! reqwest-backed transport with a shared cookie jar

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use url::Url;

use super::{parse_cookie_header, HttpRequest, HttpResponse, Method, Transport, TransportError};
use crate::config::ApiConfig;
use crate::json::JsonValue;

/// Transport over `reqwest`. Cookies set by the server (the CSRF token in
/// particular) are kept in a jar shared by every request.
pub struct ReqwestTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client, jar })
    }

    fn to_reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), request.url.clone())
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(parameters) = request.parameters {
            if request.method == Method::Get {
                let query: Vec<(String, String)> = parameters
                    .into_iter()
                    .map(|(k, v)| (k, query_value(v)))
                    .collect();
                builder = builder.query(&query);
            } else {
                let body = serde_json::to_vec(&parameters)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                builder = builder.body(body);
            }
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Body {
                    message: e.to_string(),
                    partial: None,
                }
            }
        })?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }

    fn cookies(&self, url: &Url) -> Vec<(String, String)> {
        self.jar
            .cookies(url)
            .and_then(|header| header.to_str().ok().map(parse_cookie_header))
            .unwrap_or_default()
    }

    fn add_cookie(&self, url: &Url, name: &str, value: &str) {
        self.jar.add_cookie_str(&format!("{name}={value}; Path=/"), url);
    }
}

fn query_value(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => serde_json::Value::from(other).to_string(),
    }
}
