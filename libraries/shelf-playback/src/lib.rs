//! Shelf Player - Local Playback Engine
//!
//! Plays a multi-track item (an audiobook split into files, a podcast
//! episode) as one continuous timeline.
//!
//! This crate provides:
//! - Mapping between the global timeline and (track, local offset) positions
//! - Direct play (one file per track) and adaptive streaming (one manifest)
//! - Seeking, pause/resume, volume and playback speed
//! - Automatic advance across track boundaries
//! - Buffer progress in global time
//! - Fragment retry with bounded backoff for adaptive streams
//! - Delayed stream recovery under the alternate strategy
//!
//! # Architecture
//!
//! `shelf-playback` does no decoding or audio output itself. The host
//! platform provides media elements through the [`MediaBackend`] and
//! [`MediaElement`] traits and reports what happens to them through a
//! [`MediaEventSink`]. The engine reports to the UI through [`PlayerEvent`]s.
//!
//! ```text
//! caller ──► PlaybackEngine ──► adapter ──► MediaElement (host)
//!    ▲              │                            │
//!    └─ PlayerEvent ┘◄────── signal pump ◄───────┘ MediaEventSink
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use shelf_playback::{PlaybackEngine, PlayerConfig, PlayerEvent, MediaBackend};
//! use shelf_core::{PlayStrategy, Track};
//! use std::sync::Arc;
//!
//! # async fn run(backend: Arc<dyn MediaBackend>) -> shelf_playback::Result<()> {
//! let engine = PlaybackEngine::new(backend, PlayerConfig::default())?;
//! let mut events = engine.subscribe();
//!
//! let tracks = vec![
//!     Track::new(0, 0.0, 100.0, "Chapter 1"),
//!     Track::new(1, 100.0, 50.0, "Chapter 2"),
//! ];
//! engine.set("session-1", tracks, PlayStrategy::DirectPlay, 120.0, true)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let PlayerEvent::Finished = event {
//!         break;
//!     }
//! }
//! engine.destroy();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod adapter;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod media;
pub mod retry;
pub mod types;

pub use buffer::{buffered_until, BufferedRange};
pub use config::PlayerConfig;
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use events::PlayerEvent;
pub use media::{MediaBackend, MediaElement, MediaEvent, MediaEventSink, MediaSource};
pub use retry::RetryPolicy;
pub use types::PlayerState;

// Re-export the timeline types callers need to build a session
pub use shelf_core::{PlayStrategy, PlaybackSession, SessionId, Track, TrackPosition};
