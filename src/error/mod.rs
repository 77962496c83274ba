//! Error types for statement-gate.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for all statement-gate operations.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl GateError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::InvalidArgument(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether retrying the same action later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }

    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::SignInAgain,
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server => {
                RecoverySuggestion::TryAgainLater
            }
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Storage => RecoverySuggestion::CheckStorage,
            _ => RecoverySuggestion::ContactSupport,
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Transport problems collapse into one generic retryable message; raw
    /// backend text is never surfaced for them.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server => {
                "We couldn't reach the server. Please try again in a moment.".to_string()
            }
            ErrorCategory::Authentication => "Please sign in again to continue.".to_string(),
            _ => match self {
                Self::Api { message, .. } if !message.is_empty() => message.clone(),
                Self::InvalidArgument(message) => message.clone(),
                _ => "Something went wrong. Please try again.".to_string(),
            },
        }
    }
}

impl From<AuthError> for GateError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Network(message) => GateError::Network(message),
            AuthError::Io(message) => GateError::Io(std::io::Error::other(message)),
            AuthError::Serialization(message) => GateError::Serialization(message),
            AuthError::Timeout(ms) => GateError::Timeout(ms),
            AuthError::Api { status, message } => GateError::Api { status, message },
            // A 2xx we cannot decode is the server's fault, same as a bad gateway.
            AuthError::InvalidResponse(message) => GateError::api(502, message),
            other => GateError::Authentication(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for GateError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GateError>;
