//! Error types for podterm-core

use thiserror::Error;

/// Errors from decoding client frames
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Malformed(err.to_string())
    }
}

/// Errors from terminal backends (PTY, remote exec, logs)
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to start backend: {0}")]
    StartFailed(String),

    #[error("Backend read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("Backend write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Resize failed: {0}")]
    Resize(String),

    #[error("Session is closed")]
    SessionClosed,
}

/// Errors building a cluster client
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to load kubeconfig: {0}")]
    Config(String),

    #[error("Failed to create cluster client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_error_malformed_displays_correctly() {
        let error = FrameError::Malformed("expected value at line 1".to_string());
        assert!(error.to_string().contains("Malformed frame"));
        assert!(error.to_string().contains("line 1"));
    }

    #[test]
    fn frame_error_converts_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: FrameError = serde_error.into();
        assert!(matches!(error, FrameError::Malformed(_)));
    }

    #[test]
    fn backend_error_start_failed_displays_correctly() {
        let error = BackendError::StartFailed("pods \"x\" not found".to_string());
        assert!(error.to_string().contains("Failed to start backend"));
        assert!(error.to_string().contains("not found"));
    }

    #[test]
    fn backend_error_read_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let error = BackendError::Read(io_error);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn backend_error_session_closed_displays_correctly() {
        assert_eq!(BackendError::SessionClosed.to_string(), "Session is closed");
    }
}
