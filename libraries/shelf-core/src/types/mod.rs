mod ids;
mod payload;
mod session;
mod track;

pub use ids::SessionId;
pub use payload::{PlayMethod, PlaybackSessionPayload};
pub use session::{PlayStrategy, PlaybackSession, TrackPosition};
pub use track::{Track, MANIFEST_PATH_PREFIX};
