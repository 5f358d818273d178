//! Playback Events
//!
//! Event-based communication for UI synchronization during playback.
//! Events are emitted at key points:
//! - State changes (loaded/playing/paused/finished/error)
//! - Position updates, one per host time update while playing
//! - Buffer progress, as the global time playable data reaches
//! - The timeline length, whenever media becomes ready

use crate::error::PlaybackError;
use crate::types::PlayerState;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events emitted by the player
///
/// All times are global: seconds on the whole item's timeline.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Player state changed
    StateChange(PlayerState),

    /// Playback position moved
    TimeUpdate(f64),

    /// Playable data now reaches this far
    BufferTimeUpdate(f64),

    /// Length of the whole timeline
    DurationChange(f64),

    /// Media failed; the player is now in [`PlayerState::Error`]
    Error(Arc<PlaybackError>),

    /// The last track played to its end
    Finished,
}

/// Subscriber registry
///
/// Each subscriber owns an unbounded receiver so emitting never blocks the
/// engine. Closed receivers are pruned on the next emit.
#[derive(Debug, Default)]
pub(crate) struct EventRegistry {
    subscribers: Vec<mpsc::UnboundedSender<PlayerEvent>>,
}

impl EventRegistry {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PlayerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: PlayerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Detach everyone; their receivers end after draining
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }
}
