//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// Session set, media not ready yet
    Uninitialized,

    /// Media ready, not playing
    Loaded,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Played past the end of the last track
    Finished,

    /// Media failed; waits for a new session or a stream reset
    Error,
}

impl PlayerState {
    /// Whether only `set` or a stream reset can leave this state
    pub fn is_terminal(self) -> bool {
        matches!(self, PlayerState::Finished | PlayerState::Error)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Uninitialized => "uninitialized",
            PlayerState::Loaded => "loaded",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Finished => "finished",
            PlayerState::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(PlayerState::Finished.is_terminal());
        assert!(PlayerState::Error.is_terminal());
        assert!(!PlayerState::Paused.is_terminal());
        assert!(!PlayerState::Uninitialized.is_terminal());
    }
}
