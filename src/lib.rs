//! Tillar client - authenticated REST client core for the Tillar app
//!
//! This library provides the request pipeline (credential injection,
//! CSRF handling, one-shot token refresh), typed API endpoints, and the
//! durable preference store the session lives in.

pub mod api;
pub mod client;
pub mod config;
pub mod json;
pub mod notify;
pub mod store;
pub mod transport;

pub use client::{ApiClient, ApiError, RequestSpec};

use thiserror::Error;

/// Error type for setting up and running the client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("api error: {0}")]
    Api(#[from] client::ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Tillar client operations
pub type Result<T> = std::result::Result<T, ClientError>;
