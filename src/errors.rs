//! Application error model with stable error codes
//!
//! Defines a typed error hierarchy using `thiserror` for internal error handling.
//! Each variant carries a machine-readable code that the CLI surfaces in its
//! error envelope.

use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Covers every failure the codec, parser, composer, and mailbox layers can
/// raise. "No forwarding pattern detected" is deliberately absent: that is a
/// normal `success: false` extraction result, not an error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input (validation failed, malformed request)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Resource not found (message, draft, mailbox directory)
    #[error("not found: {0}")]
    NotFound(String),
    /// Transport encoding could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
    /// Decoded bytes are not a structurally valid message
    #[error("parse error: {0}")]
    Parse(String),
    /// No usable mailbox address could be extracted from a header
    #[error("could not extract valid email address from: {0}")]
    AddressResolution(String),
    /// Operation disabled by configuration
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Internal error (I/O, serialization, unexpected failure)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Decode(_) => "decode_error",
            Self::Parse(_) => "parse_error",
            Self::AddressResolution(_) => "address_resolution",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert to the JSON error envelope printed by the CLI
    ///
    /// ```text
    /// { "error": { "code": "decode_error", "message": "decode error: ..." } }
    /// ```
    pub fn to_error_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(e.to_string())
        } else {
            Self::Internal(format!("i/o failure: {e}"))
        }
    }
}

/// Type alias for fallible return values
pub type AppResult<T> = Result<T, AppError>;
