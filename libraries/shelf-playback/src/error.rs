//! Error types for playback management

use shelf_core::CoreError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The track list handed to `set` is unusable
    #[error("Invalid session: {0}")]
    InvalidSession(#[from] CoreError),

    /// No session has been set
    #[error("No session loaded")]
    NoSession,

    /// Operation not allowed in the current player state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Argument out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The host media resource failed to load or play
    #[error("Media error: {0}")]
    Media(String),

    /// A stream fragment kept failing after every retry
    #[error("Fragment {fragment} failed after {attempts} retries")]
    FragmentRetriesExhausted { fragment: u64, attempts: u32 },

    /// A stream fragment failed with a status that is not worth retrying
    #[error("Fragment {fragment} rejected with HTTP status {status}")]
    FragmentRejected { fragment: u64, status: u16 },

    /// The host could not create a media element
    #[error("Media backend error: {0}")]
    Backend(String),

    /// The engine has been destroyed
    #[error("Player destroyed")]
    Destroyed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
