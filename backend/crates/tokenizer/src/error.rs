//! Tokenizer Error Types
//!
//! Errors surfaced by the tokenization engine and its collaborators. They map
//! onto `kernel::error::kind::ErrorKind` so the protocol layer can pick a status.

use kernel::error::kind::ErrorKind;
use platform::crypto::AeadError;
use thiserror::Error;

/// Tokenizer-specific result type alias
pub type TokenizerResult<T> = Result<T, TokenizerError>;

/// Crypto provider failures
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material has the wrong size or encoding
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// No key with this identifier is known
    #[error("Unknown key id: {0}")]
    UnknownKey(String),

    /// AEAD seal/open failure
    #[error(transparent)]
    Aead(#[from] AeadError),

    /// Decrypted card material is not UTF-8
    #[error("Decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

/// Tokenization engine errors
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// Payload could not be decoded as JSON
    #[error("Invalid JSON payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// Transformed payload could not be re-encoded
    #[error("Failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// Card store rejected a write
    #[error("Card store error: {0}")]
    Storage(String),

    /// Encryption or decryption failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Unrecognised token format name
    #[error("Unknown token format: {0}")]
    UnknownTokenFormat(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InternalServerError
    }
}

impl TokenizerError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenizerError::Decode(_) | TokenizerError::UnknownTokenFormat(_) => {
                ErrorKind::BadRequest
            }
            TokenizerError::Storage(_) => ErrorKind::ServiceUnavailable,
            TokenizerError::Encode(_) => ErrorKind::InternalServerError,
            TokenizerError::Crypto(e) => e.kind(),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            TokenizerError::Storage(msg) => {
                tracing::error!(message = %msg, "Card store error");
            }
            TokenizerError::Crypto(e) => {
                tracing::error!(error = %e, "Tokenizer crypto error");
            }
            TokenizerError::Encode(e) => {
                tracing::error!(error = %e, "Tokenizer encode error");
            }
            _ => {
                tracing::debug!(error = %self, "Tokenizer error");
            }
        }
    }
}
