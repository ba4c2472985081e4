//! Durable key-value storage for credentials and app preferences
//!
//! Everything the client persists is a string value under a string key.
//! The primary store is SQLite, but the trait allows for alternative
//! implementations like in-memory (for tests and ephemeral sessions).

mod prefs;
mod sqlite;

pub use prefs::Preferences;
pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("store lock poisoned")]
    Poisoned,
}

/// Synchronous key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// List stored keys
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory store, lost on drop
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: HashMap<String, String>) -> Self {
        Self {
            values: Mutex::new(data),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        let mut keys: Vec<String> = values.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

pub(crate) const ACCESS_TOKEN_KEY: &str = "accessToken";
pub(crate) const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub(crate) const CSRF_TOKEN_KEY: &str = "csrfToken";

/// Snapshot of the stored session credentials
pub struct Credentials {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub csrf_token: SecretString,
}

/// Credential accessors over a [`KeyValueStore`].
///
/// An empty string means "absent". Reads never fail: a store error is
/// logged and reported as absent, so a broken store behaves like a
/// logged-out session. Writes report their errors.
///
/// Access and refresh tokens are written one at a time; the last
/// successful refresh wins.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Credentials backed by a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn access_token(&self) -> String {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn refresh_token(&self) -> String {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(REFRESH_TOKEN_KEY, token)
    }

    pub fn csrf_token(&self) -> String {
        self.read(CSRF_TOKEN_KEY)
    }

    pub fn set_csrf_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(CSRF_TOKEN_KEY, token)
    }

    /// Store both tokens returned by login or refresh
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        self.set_access_token(access_token)?;
        self.set_refresh_token(refresh_token)
    }

    /// Whether an access token is stored
    pub fn has_session(&self) -> bool {
        !self.access_token().is_empty()
    }

    /// Forget access and refresh tokens. The CSRF token is kept.
    pub fn clear_session(&self) -> Result<(), StoreError> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        tracing::info!("session tokens cleared");
        Ok(())
    }

    pub fn snapshot(&self) -> Credentials {
        Credentials {
            access_token: SecretString::from(self.access_token()),
            refresh_token: SecretString::from(self.refresh_token()),
            csrf_token: SecretString::from(self.csrf_token()),
        }
    }

    fn read(&self, key: &str) -> String {
        match self.store.get(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(key = key, error = %e, "failed to read credential");
                String::new()
            }
        }
    }
}
