/// Playback session domain type
use crate::error::{CoreError, Result};
use crate::types::{SessionId, Track, MANIFEST_PATH_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest gap between two tracks still treated as contiguous (seconds)
const GAPLESS_TOLERANCE: f64 = 0.001;

/// How the media of a session is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStrategy {
    /// Each track is fetched and played as its own file
    DirectPlay,

    /// The whole item is one chunked streaming manifest
    AdaptiveStream,
}

impl PlayStrategy {
    /// The other strategy, used when failing over
    pub fn alternate(self) -> Self {
        match self {
            PlayStrategy::DirectPlay => PlayStrategy::AdaptiveStream,
            PlayStrategy::AdaptiveStream => PlayStrategy::DirectPlay,
        }
    }
}

impl fmt::Display for PlayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayStrategy::DirectPlay => write!(f, "direct-play"),
            PlayStrategy::AdaptiveStream => write!(f, "adaptive-stream"),
        }
    }
}

/// A point on the timeline expressed as (track, offset into that track)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPosition {
    /// Position of the track in the session's track list
    pub index: usize,

    /// Seconds from the start of that track
    pub local_time: f64,
}

/// Ordered tracks of one opened item plus the delivery strategy
///
/// Immutable once built; [`PlaybackSession::new`] guarantees a non-empty
/// track list sorted ascending by start offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    id: SessionId,
    tracks: Vec<Track>,
    strategy: PlayStrategy,
}

impl PlaybackSession {
    /// Build a session, validating the track list
    ///
    /// # Errors
    /// Returns an error if the list is empty, a track has a negative or
    /// non-finite offset or duration, or the tracks are out of order.
    pub fn new(id: SessionId, tracks: Vec<Track>, strategy: PlayStrategy) -> Result<Self> {
        if tracks.is_empty() {
            return Err(CoreError::EmptyTrackList);
        }

        for track in &tracks {
            if !track.start_offset.is_finite() || track.start_offset < 0.0 {
                return Err(CoreError::invalid_track(
                    track.index,
                    format!("start offset {} is not a non-negative number", track.start_offset),
                ));
            }
            if !track.duration.is_finite() || track.duration < 0.0 {
                return Err(CoreError::invalid_track(
                    track.index,
                    format!("duration {} is not a non-negative number", track.duration),
                ));
            }
        }

        for (position, pair) in tracks.windows(2).enumerate() {
            if pair[1].start_offset < pair[0].start_offset {
                return Err(CoreError::UnsortedTracks {
                    position: position + 1,
                    start_offset: pair[1].start_offset,
                    previous_offset: pair[0].start_offset,
                });
            }
        }

        Ok(Self {
            id,
            tracks,
            strategy,
        })
    }

    /// Session identifier
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// All tracks, in timeline order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track at a list position
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Number of tracks (never zero)
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the session has no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Delivery strategy
    pub fn strategy(&self) -> PlayStrategy {
        self.strategy
    }

    /// Same tracks delivered under another strategy
    pub fn with_strategy(&self, strategy: PlayStrategy) -> Self {
        Self {
            id: self.id.clone(),
            tracks: self.tracks.clone(),
            strategy,
        }
    }

    fn last(&self) -> &Track {
        // The constructor rejects empty lists
        &self.tracks[self.tracks.len() - 1]
    }

    /// Length of the whole timeline: end of the last track
    pub fn total_duration(&self) -> f64 {
        self.last().end_offset()
    }

    /// Whether every track starts where the previous one ends
    pub fn is_gapless(&self) -> bool {
        self.tracks
            .windows(2)
            .all(|pair| (pair[1].start_offset - pair[0].end_offset()).abs() <= GAPLESS_TOLERANCE)
    }

    /// Map a global time onto a track
    ///
    /// - A time inside a track resolves to that track (upper bound exclusive,
    ///   so the end of one track is the start of the next).
    /// - At or past the end of the timeline the position clamps to the end of
    ///   the last track.
    /// - Before the first track (or NaN) resolves to the start of the first track.
    /// - A time inside a gap resolves to the start of the next track.
    pub fn locate(&self, time: f64) -> TrackPosition {
        let first = &self.tracks[0];
        if time.is_nan() || time < first.start_offset {
            return TrackPosition {
                index: 0,
                local_time: 0.0,
            };
        }

        if let Some(index) = self.tracks.iter().position(|t| t.contains_time(time)) {
            return TrackPosition {
                index,
                local_time: time - self.tracks[index].start_offset,
            };
        }

        let last = self.last();
        if time >= last.end_offset() {
            return TrackPosition {
                index: self.tracks.len() - 1,
                local_time: last.duration,
            };
        }

        let index = self
            .tracks
            .iter()
            .position(|t| t.start_offset > time)
            .unwrap_or(self.tracks.len() - 1);
        TrackPosition {
            index,
            local_time: 0.0,
        }
    }

    /// Global time of a track position
    pub fn global_time(&self, position: TrackPosition) -> f64 {
        self.tracks
            .get(position.index)
            .map_or(0.0, |t| t.start_offset)
            + position.local_time
    }

    /// Manifest locator used when the session is streamed adaptively
    ///
    /// The first manifest path carried by a track wins; otherwise the server's
    /// conventional per-session manifest path is used.
    pub fn manifest_address(&self) -> String {
        self.tracks
            .iter()
            .find(|t| t.is_manifest())
            .map(|t| t.content_url.clone())
            .unwrap_or_else(|| format!("{}/{}/output.m3u8", MANIFEST_PATH_PREFIX, self.id))
    }
}
