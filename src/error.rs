//! Error types for verisocks-client.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection error (connect retries exhausted, peer closed, short write).
    ///
    /// Terminal for the connection: the transport handle is unusable once
    /// this is returned.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol error (malformed frame, desynchronized stream, unexpected
    /// reply shape). Terminal, never retried.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error reply from the simulation kernel (bad object path, run budget
    /// exhausted, target time in the past).
    ///
    /// The only recoverable class: the connection stays usable and callers
    /// may catch this and continue issuing commands.
    #[error("Simulation error: {0}")]
    Simulation(String),
}

impl Error {
    /// Check whether this is a kernel-side error reply, i.e. the connection
    /// is still usable.
    #[inline]
    pub fn is_simulation(&self) -> bool {
        matches!(self, Error::Simulation(_))
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
