//! Player configuration

use crate::error::{PlaybackError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Slowest playback rate accepted
pub const MIN_PLAYBACK_RATE: f64 = 0.25;

/// Fastest playback rate accepted
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

/// Configuration for the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Wait between releasing a failed stream and building its replacement (default: 1000)
    pub recovery_grace_ms: u64,

    /// Minimum spacing of time updates while not playing (default: 1000)
    pub paused_time_update_interval_ms: u64,

    /// Initial volume (0.0 - 1.0, default: 1.0)
    pub volume: f64,

    /// Initial playback rate (default: 1.0)
    pub playback_rate: f64,

    /// Retry policy for adaptive stream fragments
    pub fragment_retry: RetryPolicy,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            recovery_grace_ms: 1000,
            paused_time_update_interval_ms: 1000,
            volume: 1.0,
            playback_rate: 1.0,
            fragment_retry: RetryPolicy::default(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables are prefixed with `SHELF_` and use `__` for
    /// nesting, e.g. `SHELF_RECOVERY_GRACE_MS=500` or
    /// `SHELF_FRAGMENT_RETRY__MAX_RETRIES=3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path.to_path_buf()));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SHELF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        let player: PlayerConfig = config
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        player.validate()?;
        Ok(player)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(PlaybackError::Config(format!(
                "volume must be between 0.0 and 1.0, got {}",
                self.volume
            )));
        }

        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&self.playback_rate) {
            return Err(PlaybackError::Config(format!(
                "playback_rate must be between {} and {}, got {}",
                MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE, self.playback_rate
            )));
        }

        if self.paused_time_update_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "paused_time_update_interval_ms must be positive".to_string(),
            ));
        }

        if self.fragment_retry.base_delay_ms > self.fragment_retry.max_delay_ms {
            return Err(PlaybackError::Config(format!(
                "fragment_retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.fragment_retry.base_delay_ms, self.fragment_retry.max_delay_ms
            )));
        }

        Ok(())
    }

    /// Recovery grace period
    pub fn recovery_grace(&self) -> Duration {
        Duration::from_millis(self.recovery_grace_ms)
    }

    /// Time update throttle while not playing
    pub fn paused_time_update_interval(&self) -> Duration {
        Duration::from_millis(self.paused_time_update_interval_ms)
    }
}
