//! Error types for the balance tracker.

use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sample clock started while already active
    #[error("sample clock is already running")]
    AlreadyRunning,

    /// Transport operation attempted without an open channel
    #[error("transport is not connected")]
    NotConnected,

    /// No session_started acknowledgment within the handshake timeout
    #[error("no session_started acknowledgment within {0:?}")]
    SessionStartTimeout(Duration),

    /// No session_ended acknowledgment within the handshake timeout
    #[error("no session_ended acknowledgment within {0:?}")]
    SessionEndTimeout(Duration),

    /// Too few boundary points to enclose a volume
    #[error("insufficient boundary points: found {found}, need at least 3")]
    InsufficientBoundary {
        /// Boundary points actually extracted
        found: usize,
    },

    /// Session record carries no samples
    #[error("session contains no samples")]
    EmptySession,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
