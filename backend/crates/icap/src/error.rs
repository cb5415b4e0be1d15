//! ICAP Error Types
//!
//! Framing and dispatch failures. Each maps onto an ICAP status through
//! `kernel::error::kind::ErrorKind`.

use kernel::error::kind::ErrorKind;
use thiserror::Error;

/// ICAP-specific result type alias
pub type IcapResult<T> = Result<T, IcapError>;

/// ICAP protocol errors
#[derive(Debug, Error)]
pub enum IcapError {
    /// Transport failure while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request line without method, URI and version
    #[error("Malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// A protocol line exceeded the line limit
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// REQMOD/RESPMOD without an Encapsulated header
    #[error("Missing Encapsulated header")]
    MissingEncapsulated,

    /// Chunk-size line is not hexadecimal
    #[error("Invalid chunk size: {0:?}")]
    InvalidChunkSize(String),

    /// Stream ended inside a header block or body
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Encapsulated body larger than the configured limit
    #[error("Body exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Method other than OPTIONS, REQMOD or RESPMOD
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl IcapError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IcapError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            _ => ErrorKind::BadRequest,
        }
    }

    /// Whether the connection should be closed without a reply
    pub fn is_silent(&self) -> bool {
        matches!(self, IcapError::MalformedRequestLine(_))
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            IcapError::Io(e) => {
                tracing::warn!(error = %e, "ICAP transport error");
            }
            IcapError::BodyTooLarge { limit } => {
                tracing::warn!(limit, "ICAP body exceeds limit");
            }
            IcapError::MethodNotAllowed(method) => {
                tracing::info!(method = %method, "ICAP method not allowed");
            }
            _ => {
                tracing::debug!(error = %self, "ICAP framing error");
            }
        }
    }
}
