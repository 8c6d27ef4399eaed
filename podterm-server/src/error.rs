//! Server error types

use thiserror::Error;

/// Errors that can occur in the podterm server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors on a single terminal session's connection
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("connection read failed: {0}")]
    ConnectionRead(String),

    #[error("connection write failed: {0}")]
    ConnectionWrite(String),

    #[error("connection write timed out")]
    WriteTimeout,

    #[error("session is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let error = ServerError::Bind {
            addr: "0.0.0.0:9000".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(error.to_string().contains("0.0.0.0:9000"));
    }

    #[test]
    fn session_errors_display() {
        assert_eq!(SessionError::Closed.to_string(), "session is closed");
        assert!(
            SessionError::ConnectionRead("reset".to_string())
                .to_string()
                .contains("reset")
        );
    }
}
