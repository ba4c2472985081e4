//! Error taxonomy surfaced to API callers

use thiserror::Error;

use crate::transport::TransportError;

/// Why a request did not produce a value.
///
/// The `Display` text doubles as the generic message shown to the user
/// when the backend did not supply one.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request")]
    BadRequest,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Server error")]
    ServerError,

    #[error("Decoding error")]
    Decoding(#[source] serde_json::Error),

    /// Message taken from the backend's `errors` list
    #[error("{0}")]
    Backend(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("HTTP {status}")]
    HttpStatus { status: u16, body: Vec<u8> },
}

impl ApiError {
    /// Map a non-2xx status to its error kind
    pub fn from_status(status: u16, body: Vec<u8>) -> Self {
        match status {
            400 => ApiError::BadRequest,
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            500..=599 => ApiError::ServerError,
            _ => ApiError::HttpStatus { status, body },
        }
    }

    /// The session is gone and the user has to log in again
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// The request was abandoned through its cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Transport(TransportError::Cancelled))
    }

    /// Status code this error came from, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest => Some(400),
            ApiError::Unauthorized => Some(401),
            ApiError::Forbidden => Some(403),
            ApiError::NotFound => Some(404),
            ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
