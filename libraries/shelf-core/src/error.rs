/// Core error types for Shelf Player
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Shelf Player
#[derive(Error, Debug)]
pub enum CoreError {
    /// A session needs at least one track
    #[error("Track list is empty")]
    EmptyTrackList,

    /// Tracks must be sorted ascending by start offset
    #[error("Track at position {position} starts at {start_offset}s, before the previous track ({previous_offset}s)")]
    UnsortedTracks {
        position: usize,
        start_offset: f64,
        previous_offset: f64,
    },

    /// A track carries an unusable offset or duration
    #[error("Invalid track {index}: {reason}")]
    InvalidTrack { index: u32, reason: String },

    /// An address could not be joined onto the server base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an invalid track error
    pub fn invalid_track(index: u32, reason: impl Into<String>) -> Self {
        Self::InvalidTrack {
            index,
            reason: reason.into(),
        }
    }
}
