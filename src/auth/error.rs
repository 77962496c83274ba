use thiserror::Error;

use crate::util::fs::{ReadError, WriteError};

/// Authentication and transport errors seen by the session layer.
///
/// `Clone` so a single in-flight refresh can hand the same failure to every
/// waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Session expired; sign in again")]
    ReauthenticationRequired,
    #[error("Unauthorized (status {status})")]
    Unauthorized { status: u16 },
    #[error("Rejected: {reason}")]
    Rejected { status: u16, reason: String },
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout after {0}ms")]
    Timeout(u64),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// True for 401/403 style failures that a token refresh may fix.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout(0);
        }
        if error.is_decode() {
            return Self::InvalidResponse(error.to_string());
        }
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<ReadError> for AuthError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Io(err) => err.into(),
            ReadError::Parse(_) => Self::Serialization(error.to_string()),
        }
    }
}

impl From<WriteError> for AuthError {
    fn from(error: WriteError) -> Self {
        match error {
            WriteError::Serialize(_) => Self::Serialization(error.to_string()),
            WriteError::Io(_) | WriteError::NoFileName(_) => Self::Io(error.to_string()),
        }
    }
}
