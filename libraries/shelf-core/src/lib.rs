//! Shelf Player Core
//!
//! Platform-agnostic timeline types and error handling for Shelf Player.
//!
//! An item opened for listening (an audiobook, a podcast episode) is served
//! as a playback session: an ordered list of [`Track`]s laid end to end on one
//! global timeline, plus the delivery strategy the server picked for it.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `PlaybackSession`, `TrackPosition`, `SessionId`
//! - **Wire Types**: `PlaybackSessionPayload` as returned by the server
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use shelf_core::{PlayStrategy, PlaybackSession, SessionId, Track};
//!
//! let tracks = vec![
//!     Track::new(0, 0.0, 100.0, "Chapter 1"),
//!     Track::new(1, 100.0, 50.0, "Chapter 2"),
//! ];
//! let session = PlaybackSession::new(SessionId::new("abc"), tracks, PlayStrategy::DirectPlay)?;
//!
//! let position = session.locate(120.0);
//! assert_eq!(position.index, 1);
//! assert_eq!(position.local_time, 20.0);
//! assert_eq!(session.total_duration(), 150.0);
//! # Ok::<(), shelf_core::CoreError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{
    PlayMethod, PlayStrategy, PlaybackSession, PlaybackSessionPayload, SessionId, Track,
    TrackPosition, MANIFEST_PATH_PREFIX,
};
