//! HTTP transport abstraction
//!
//! The client never talks to sockets directly. It hands a fully built
//! [`HttpRequest`] to a [`Transport`] and gets back a status and body, or a
//! [`TransportError`] when no HTTP response arrived at all. The transport
//! also owns the cookie jar, which is where the CSRF token comes from.

mod http;
#[cfg(test)]
pub mod mock;

pub use self::http::ReqwestTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::json::Parameters;

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to go on the wire
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// JSON body, or query parameters for GET
    pub parameters: Option<Parameters>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// First header value with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a completed exchange
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures where no HTTP response was received
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to read response body: {message}")]
    Body {
        message: String,
        /// Whatever arrived before the failure
        partial: Option<Vec<u8>>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Bytes received before the failure, if any
    pub fn partial_body(&self) -> Option<&[u8]> {
        match self {
            TransportError::Body {
                partial: Some(body),
                ..
            } => Some(body.as_slice()),
            _ => None,
        }
    }
}

/// Something that can perform HTTP exchanges
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the full response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Cookies the jar would send to `url`, as name/value pairs
    fn cookies(&self, url: &Url) -> Vec<(String, String)>;

    /// Put a cookie for `url` into the jar, as if the server had set it
    fn add_cookie(&self, url: &Url, name: &str, value: &str);
}

/// Split a `Cookie` header value into name/value pairs
pub(crate) fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("sessionid=abc; csrftoken=x=y; broken");
        assert_eq!(
            cookies,
            vec![
                ("sessionid".to_string(), "abc".to_string()),
                ("csrftoken".to_string(), "x=y".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = HttpRequest {
            method: Method::Get,
            url: Url::parse("https://api.example.com/x").unwrap(),
            headers: vec![("X-CSRFToken".to_string(), "t".to_string())],
            parameters: None,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(request.header("x-csrftoken"), Some("t"));
        assert_eq!(request.header("authorization"), None);
    }

    #[test]
    fn test_partial_body_only_for_body_errors() {
        let err = TransportError::Body {
            message: "eof".into(),
            partial: Some(b"{}".to_vec()),
        };
        assert_eq!(err.partial_body(), Some(&b"{}"[..]));
        assert!(TransportError::Cancelled.partial_body().is_none());
    }
}
