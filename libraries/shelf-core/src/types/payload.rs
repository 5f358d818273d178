//! Playback session payload as returned by the server when an item is opened
use crate::error::Result;
use crate::types::{PlayStrategy, PlaybackSession, SessionId, Track};
use serde::{Deserialize, Serialize};

/// Delivery method chosen by the server, encoded as an integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlayMethod {
    /// Original files served as-is
    #[default]
    DirectPlay,

    /// Original files remuxed on the fly
    DirectStream,

    /// Transcoded into a streaming manifest
    Transcode,

    /// Files already on the device
    Local,
}

impl PlayMethod {
    /// Strategy the playback engine uses for this method
    pub fn strategy(self) -> PlayStrategy {
        match self {
            PlayMethod::Transcode => PlayStrategy::AdaptiveStream,
            PlayMethod::DirectPlay | PlayMethod::DirectStream | PlayMethod::Local => {
                PlayStrategy::DirectPlay
            }
        }
    }
}

impl TryFrom<u8> for PlayMethod {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(PlayMethod::DirectPlay),
            1 => Ok(PlayMethod::DirectStream),
            2 => Ok(PlayMethod::Transcode),
            3 => Ok(PlayMethod::Local),
            other => Err(format!("unknown play method {other}")),
        }
    }
}

impl From<PlayMethod> for u8 {
    fn from(method: PlayMethod) -> Self {
        match method {
            PlayMethod::DirectPlay => 0,
            PlayMethod::DirectStream => 1,
            PlayMethod::Transcode => 2,
            PlayMethod::Local => 3,
        }
    }
}

/// Session payload, the subset of fields the player consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSessionPayload {
    /// Session identifier
    pub id: SessionId,

    /// Item the session was opened for
    #[serde(default)]
    pub library_item_id: Option<String>,

    /// Title shown while playing
    #[serde(default)]
    pub display_title: Option<String>,

    /// Delivery method
    #[serde(default)]
    pub play_method: PlayMethod,

    /// Last known listening position (global seconds)
    #[serde(default)]
    pub current_time: f64,

    /// Tracks in timeline order
    pub audio_tracks: Vec<Track>,
}

impl PlaybackSessionPayload {
    /// Parse a payload from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Strategy implied by the play method
    pub fn strategy(&self) -> PlayStrategy {
        self.play_method.strategy()
    }

    /// Resume position clamped into the timeline
    pub fn start_time(&self) -> f64 {
        let total = self
            .audio_tracks
            .last()
            .map_or(0.0, Track::end_offset);
        if self.current_time.is_finite() {
            self.current_time.clamp(0.0, total.max(0.0))
        } else {
            0.0
        }
    }

    /// Validate the tracks and build a session
    ///
    /// # Errors
    /// Returns the same configuration errors as [`PlaybackSession::new`].
    pub fn into_session(self) -> Result<PlaybackSession> {
        let strategy = self.strategy();
        PlaybackSession::new(self.id, self.audio_tracks, strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;

    const PAYLOAD: &str = r#"{
        "id": "play_abc123",
        "libraryItemId": "li_42",
        "displayTitle": "The Long Book",
        "playMethod": 0,
        "currentTime": 120.0,
        "audioTracks": [
            { "index": 1, "startOffset": 0, "duration": 100, "title": "01.mp3",
              "contentUrl": "/api/items/li_42/file/1", "mimeType": "audio/mpeg", "metadata": {} },
            { "index": 2, "startOffset": 100, "duration": 50, "title": "02.mp3",
              "contentUrl": "/api/items/li_42/file/2", "mimeType": "audio/mpeg", "metadata": {} }
        ]
    }"#;

    #[test]
    fn parses_direct_play_payload() {
        let payload = PlaybackSessionPayload::from_json(PAYLOAD).unwrap();
        assert_eq!(payload.id.as_str(), "play_abc123");
        assert_eq!(payload.play_method, PlayMethod::DirectPlay);
        assert_eq!(payload.strategy(), PlayStrategy::DirectPlay);
        assert_eq!(payload.start_time(), 120.0);

        let session = payload.into_session().unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.total_duration(), 150.0);
    }

    #[test]
    fn transcode_maps_to_adaptive_stream() {
        let json = r#"{
            "id": "play_hls",
            "playMethod": 2,
            "audioTracks": [
                { "index": 0, "startOffset": 0, "duration": 150,
                  "contentUrl": "/hls/play_hls/output.m3u8", "mimeType": "application/vnd.apple.mpegurl" }
            ]
        }"#;
        let payload = PlaybackSessionPayload::from_json(json).unwrap();
        assert_eq!(payload.strategy(), PlayStrategy::AdaptiveStream);
        assert_eq!(payload.start_time(), 0.0);
    }

    #[test]
    fn unknown_play_method_is_rejected() {
        let json = r#"{ "id": "x", "playMethod": 9, "audioTracks": [] }"#;
        let err = PlaybackSessionPayload::from_json(json).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn start_time_is_clamped_to_timeline() {
        let mut payload = PlaybackSessionPayload::from_json(PAYLOAD).unwrap();
        payload.current_time = 9_000.0;
        assert_eq!(payload.start_time(), 150.0);
        payload.current_time = -3.0;
        assert_eq!(payload.start_time(), 0.0);
    }

    #[test]
    fn empty_track_list_fails_when_building_session() {
        let json = r#"{ "id": "x", "audioTracks": [] }"#;
        let payload = PlaybackSessionPayload::from_json(json).unwrap();
        assert!(matches!(
            payload.into_session(),
            Err(CoreError::EmptyTrackList)
        ));
    }
}
