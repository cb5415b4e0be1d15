//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum that maps failures onto the status codes
//! shared by ICAP/1.0 (RFC 3507) and HTTP.

use serde::Serialize;

/// Status classification of an error
///
/// Every variant maps onto a status code that is valid on an ICAP status
/// line. The HTTP-facing validation layer uses the same table.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::MethodNotAllowed;
/// assert_eq!(kind.status_code(), 405);
/// assert_eq!(kind.as_str(), "Method Not Allowed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - Bad Request: malformed framing or input
    BadRequest,
    /// 405 - Method Not Allowed
    MethodNotAllowed,
    /// 413 - Payload Too Large
    PayloadTooLarge,
    /// 500 - Internal Server Error
    InternalServerError,
    /// 503 - Service Unavailable (ICAP: service overloaded)
    ServiceUnavailable,
}

impl ErrorKind {
    /// Status code for this kind
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::BadRequest.status_code(), 400);
    /// ```
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Reason phrase written after the status code
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::BadRequest.as_str(), "Bad Request");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::MethodNotAllowed => "Method Not Allowed",
            ErrorKind::PayloadTooLarge => "Payload Too Large",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status_code(), self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::MethodNotAllowed.status_code(), 405);
        assert_eq!(ErrorKind::PayloadTooLarge.status_code(), 413);
        assert_eq!(ErrorKind::InternalServerError.status_code(), 500);
        assert_eq!(ErrorKind::ServiceUnavailable.status_code(), 503);
    }

    #[test]
    fn test_display_is_status_line_tail() {
        assert_eq!(ErrorKind::BadRequest.to_string(), "400 Bad Request");
        assert_eq!(
            ErrorKind::MethodNotAllowed.to_string(),
            "405 Method Not Allowed"
        );
    }
}
