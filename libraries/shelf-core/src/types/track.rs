/// Track domain type
use crate::error::Result;
use crate::types::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Path prefix the server uses for adaptive streaming manifests
pub const MANIFEST_PATH_PREFIX: &str = "/hls";

/// One contiguous media segment of an item and its slice of the global timeline
///
/// Offsets and durations are in seconds. The serialized form matches the
/// track objects of a playback session payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Position of the track within its session
    pub index: u32,

    /// Where the track starts on the global timeline
    pub start_offset: f64,

    /// Track length
    pub duration: f64,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Server-relative content path
    #[serde(default)]
    pub content_url: String,

    /// MIME type of the underlying file
    #[serde(default)]
    pub mime_type: String,

    /// Free-form metadata carried through from the server
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(index: u32, start_offset: f64, duration: f64, title: impl Into<String>) -> Self {
        Self {
            index,
            start_offset,
            duration,
            title: title.into(),
            content_url: String::new(),
            mime_type: String::new(),
            metadata: Map::new(),
        }
    }

    /// Set the content path
    pub fn with_content_url(mut self, content_url: impl Into<String>) -> Self {
        self.content_url = content_url.into();
        self
    }

    /// Set the MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Where the track ends on the global timeline
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.duration
    }

    /// Whether `time` falls inside this track
    ///
    /// The upper bound is exclusive: the instant a track ends belongs to the
    /// track that follows it.
    pub fn contains_time(&self, time: f64) -> bool {
        self.start_offset <= time && time < self.end_offset()
    }

    /// Whether the content path points at an adaptive streaming manifest
    pub fn is_manifest(&self) -> bool {
        self.content_url.starts_with(MANIFEST_PATH_PREFIX)
    }

    /// Server-relative address this track is played from
    ///
    /// Manifest paths are already complete and session-independent, so they are
    /// used verbatim. Anything else is served through the session's direct-play
    /// route.
    pub fn resolve_address(&self, session_id: &SessionId) -> String {
        if self.is_manifest() {
            self.content_url.clone()
        } else {
            format!("/public/session/{}/track/{}", session_id, self.index)
        }
    }

    /// Absolute URL of [`Track::resolve_address`] on the given server
    ///
    /// Any path on `base` (a reverse-proxy prefix) is kept in front of the
    /// address.
    pub fn resolve_url(&self, base: &Url, session_id: &SessionId) -> Result<Url> {
        let root = base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{}{}",
            root,
            self.resolve_address(session_id)
        ))?)
    }
}
