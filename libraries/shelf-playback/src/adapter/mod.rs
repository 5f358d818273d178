//! Media resource adapters
//!
//! An adapter owns exactly one host element at a time and gives the engine
//! the same primitives regardless of how the media is delivered:
//! - [`DirectPlayAdapter`]: one element per track file
//! - [`AdaptiveStreamAdapter`]: one element for the whole manifest
//!
//! Adapters work in local time (seconds within what they have loaded); the
//! engine translates to and from the global timeline.

mod adaptive;
mod direct;

pub(crate) use adaptive::AdaptiveStreamAdapter;
pub(crate) use direct::DirectPlayAdapter;

use crate::buffer::BufferedRange;
use crate::error::{PlaybackError, Result};
use crate::media::Signal;
use shelf_core::PlayStrategy;

/// What an adapter should load
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoadTarget {
    pub address: String,
    pub mime_type: String,
}

/// Uniform adapter notifications
#[derive(Debug)]
pub(crate) enum AdapterEvent {
    /// Loaded resource is playable; carries its own length
    Ready { duration: f64 },
    TimeProgressed { local_time: f64 },
    BufferChanged,
    Ended,
    Error(PlaybackError),
}

/// Contract shared by both delivery strategies
pub(crate) trait MediaAdapter: Send {
    fn strategy(&self) -> PlayStrategy;

    /// Begin loading; `Ready` follows asynchronously
    fn load(&mut self, target: LoadTarget, local_start: f64) -> Result<()>;

    /// Play now, or as soon as the resource is ready
    fn play(&mut self);

    /// Pause, and drop any pending play-when-ready
    fn pause(&mut self);

    /// Reposition within the loaded resource only
    fn seek_local(&mut self, time: f64);

    fn local_time(&self) -> f64;

    fn buffered_ranges(&self) -> Vec<BufferedRange>;

    fn set_volume(&mut self, volume: f64);

    fn set_playback_rate(&mut self, rate: f64);

    fn is_ready(&self) -> bool;

    /// Translate a signal addressed to this adapter
    fn handle_signal(&mut self, signal: Signal) -> Option<AdapterEvent>;

    /// Release the element and any timers; idempotent
    fn dispose(&mut self);
}
