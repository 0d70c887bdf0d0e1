//! Top-level error type for the bridge
//!
//! Per-message errors ([`DecodeError`](crate::event::DecodeError),
//! [`ClassifyError`](crate::classifier::ClassifyError),
//! [`DispatchError`](crate::notify::DispatchError)) never leave the message
//! processing cycle. Only the errors collected here reach `main`.

use crate::notify::UnsupportedPlatform;
use crate::transport::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static URI_PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(amqps?://[^:/@\s]*):[^@\s]*@").unwrap());
static KEY_VALUE_SECRET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(password|passwd|secret)[=:]\s*\S+").unwrap());

/// Errors that end the process
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BridgeError {
    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::UnsupportedPlatform(_) => 2,
            _ => 1,
        }
    }
}

/// Mask credentials in text before it reaches the logs
pub fn redact_credentials(message: &str) -> String {
    let redacted = URI_PASSWORD.replace_all(message, "${1}:***@");
    KEY_VALUE_SECRET
        .replace_all(&redacted, "${1}=***")
        .into_owned()
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
