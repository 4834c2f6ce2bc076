//! Error types for the Bravo Zero SDK.
//!
//! Every client operation either returns a fully populated result or one of
//! the [`Error`] kinds below. Nothing is recovered locally; the only retry
//! logic is the opt-in policy in [`crate::transport::retry`].

use thiserror::Error;

use crate::types::EvaluationResult;

/// Main error type for SDK operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or rejected credentials (HTTP 401/403).
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed local input, caught before any request is sent.
    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Non-success response from the platform.
    #[error("Remote error: {status} - {message}")]
    Remote { status: u16, message: String },

    /// The remote resource does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure: connect, timeout, broken body.
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// The constitution denied the evaluated action. `result` is the full
    /// evaluation, including request id and applied rules.
    #[error("Action denied: {reasoning}")]
    Denied {
        reasoning: String,
        result: Box<EvaluationResult>,
    },

    /// A success response whose body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Attestation signing errors
    #[error("Attestation error: {0}")]
    Attestation(#[from] AttestationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client was closed; no further requests are sent.
    #[error("Client closed")]
    Closed,
}

/// Result type alias for the SDK.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote error from an HTTP status and message.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Whether the failure is transient and the request may be resent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

/// Errors related to Configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Errors related to PERSONA attestations.
#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("Failed to load private key: {0}")]
    KeyLoadFailed(String),

    #[error("Private key must be Ed25519: {0}")]
    InvalidKey(String),

    #[error("Malformed attestation: {0}")]
    Malformed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}
