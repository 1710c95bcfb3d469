//! Error types
//!
//! Each external boundary (capture, encoder, settings) has its own error enum;
//! they all convert into the crate-level [`Error`].

use std::io;
use std::path::PathBuf;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Request line could not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Request headers (or body) exceeded the configured limit
    #[error("request exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },

    /// Peer closed the connection before a full request arrived
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a capture source
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    /// No display with the requested id
    #[error("display {0} not found")]
    DisplayNotFound(u32),

    /// The source could not enumerate or start capturing
    #[error("capture unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by an encoder or one of its sessions
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to create encoder session: {0}")]
    SessionCreate(String),

    /// Frame does not match the session (size, pixel format, truncated data)
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Session was invalidated and accepts no more frames
    #[error("encoder session invalidated")]
    Invalidated,

    #[error("compression failed: {0}")]
    Compression(String),
}

/// Errors from decoding or persisting stream settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid settings JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("setting out of range: {0}")]
    OutOfRange(&'static str),

    #[error("failed to load settings from {path}: {source}")]
    Load { path: PathBuf, source: io::Error },

    #[error("failed to persist settings to {path}: {source}")]
    Persist { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_errors_convert() {
        let err: Error = CaptureError::DisplayNotFound(7).into();
        assert!(matches!(err, Error::Capture(CaptureError::DisplayNotFound(7))));
        assert_eq!(err.to_string(), "display 7 not found");

        let err: Error = EncodeError::Invalidated.into();
        assert_eq!(err.to_string(), "encoder session invalidated");
    }

    #[test]
    fn test_request_too_large_message() {
        let err = Error::RequestTooLarge { limit: 1024 };
        assert_eq!(err.to_string(), "request exceeds 1024 bytes");
    }
}
