//! HTTP error types

use std::fmt;

use thiserror::Error;

/// Result type returned by every fallible operation in this crate
pub type Result<T, E = HttpError> = std::result::Result<T, E>;

/// Phase in which a deadline expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutPhase {
    /// Establishing the transport connection
    Connect,
    /// Reading the response after the request was sent
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => f.write_str("connect"),
            TimeoutPhase::Read => f.write_str("read"),
        }
    }
}

/// HTTP errors that can occur while building or executing requests
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The request could not be built; no I/O was attempted
    #[error("Request build error: {0}")]
    Build(String),
    /// The request payload could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),
    /// Connection error
    #[error("Connection error: {0}")]
    Connect(String),
    /// Connect or read deadline exceeded
    #[error("Request timeout ({0})")]
    Timeout(TimeoutPhase),
    /// Writing the request to the connection failed
    #[error("Write error: {0}")]
    Write(String),
    /// Malformed or truncated response framing
    #[error("Read error: {0}")]
    Read(String),
    /// Body bytes do not match the codec's grammar
    #[error("Decode error: {0}")]
    Decode(String),
    /// Redirect limit exhausted
    #[error("Too many redirects (limit {max})")]
    RedirectLoop {
        /// Configured redirect limit
        max: u32,
    },
    /// HTTP error with status code
    #[error("HTTP error ({status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },
}

impl HttpError {
    /// Whether a connect or read deadline expired
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout(_))
    }

    /// The phase in which a deadline expired, if this is a timeout
    pub fn timeout_phase(&self) -> Option<TimeoutPhase> {
        match self {
            HttpError::Timeout(phase) => Some(*phase),
            _ => None,
        }
    }

    /// Map an I/O failure during the read phase
    pub(crate) fn from_read_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => HttpError::Timeout(TimeoutPhase::Read),
            ErrorKind::UnexpectedEof => HttpError::Read(format!("truncated response: {}", err)),
            _ => HttpError::Read(err.to_string()),
        }
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        HttpError::Build(format!("invalid URL: {}", err))
    }
}

impl From<serde_urlencoded::ser::Error> for HttpError {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        HttpError::Encode(err.to_string())
    }
}

impl From<serde_urlencoded::de::Error> for HttpError {
    fn from(err: serde_urlencoded::de::Error) -> Self {
        HttpError::Decode(err.to_string())
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Io => HttpError::Encode(err.to_string()),
            Category::Syntax | Category::Data | Category::Eof => HttpError::Decode(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_http_error_status_display() {
        let error = HttpError::Status {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(format!("{}", error), "HTTP error (404): Not Found");
    }

    #[test]
    fn test_http_error_connect_display() {
        let error = HttpError::Connect("connection refused".to_string());
        assert_eq!(format!("{}", error), "Connection error: connection refused");
    }

    #[test]
    fn test_http_error_timeout_display() {
        assert_eq!(
            format!("{}", HttpError::Timeout(TimeoutPhase::Connect)),
            "Request timeout (connect)"
        );
        assert_eq!(
            format!("{}", HttpError::Timeout(TimeoutPhase::Read)),
            "Request timeout (read)"
        );
    }

    #[test]
    fn test_http_error_build_display() {
        let error = HttpError::Build("no method".to_string());
        assert_eq!(format!("{}", error), "Request build error: no method");
    }

    #[test]
    fn test_http_error_redirect_loop_display() {
        let error = HttpError::RedirectLoop { max: 3 };
        assert_eq!(format!("{}", error), "Too many redirects (limit 3)");
    }

    #[test]
    fn test_timeout_phase_accessors() {
        let error = HttpError::Timeout(TimeoutPhase::Read);
        assert!(error.is_timeout());
        assert_eq!(error.timeout_phase(), Some(TimeoutPhase::Read));

        let error = HttpError::Read("truncated".to_string());
        assert!(!error.is_timeout());
        assert_eq!(error.timeout_phase(), None);
    }

    #[test]
    fn test_from_read_io() {
        let timed_out = HttpError::from_read_io(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(timed_out, HttpError::Timeout(TimeoutPhase::Read)));

        let would_block = HttpError::from_read_io(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(matches!(would_block, HttpError::Timeout(TimeoutPhase::Read)));

        let eof = HttpError::from_read_io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(eof, HttpError::Read(_)));
    }

    #[test]
    fn test_from_url_parse_error() {
        let parse_error = url::Url::parse("not a url").expect_err("Should not parse");
        let http_error: HttpError = parse_error.into();
        assert!(matches!(http_error, HttpError::Build(_)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_from_serde_json_error() {
        let result: std::result::Result<String, _> = serde_json::from_str("not valid json");
        let json_error = result.expect_err("Invalid JSON should produce an error");
        let http_error: HttpError = json_error.into();

        match http_error {
            HttpError::Decode(msg) => {
                assert!(
                    msg.contains("expected"),
                    "Error message should describe JSON error"
                );
            }
            _ => panic!("Expected HttpError::Decode"),
        }
    }
}
