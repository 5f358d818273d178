//! Buffered range tracking
//!
//! Media resources report which stretches of their own (local) timeline are
//! already downloaded. The player only cares how far ahead playable data
//! reaches from the current position.

use serde::{Deserialize, Serialize};

/// Contiguous span of local time with playable data
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferedRange {
    /// Start of the span (seconds)
    pub start: f64,

    /// End of the span (seconds)
    pub end: f64,
}

impl BufferedRange {
    /// Create a range
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// How far playable data reaches, in local time
///
/// `ranges` must be ordered and non-overlapping, as media resources report
/// them. Ranges with an unusable end are ignored; an unusable start is read as
/// 0. The range containing `current_time` wins; otherwise the end of the last
/// range is reported, or 0 when nothing is buffered.
pub fn buffered_until(ranges: &[BufferedRange], current_time: f64) -> f64 {
    let usable = ranges
        .iter()
        .filter(|r| r.end.is_finite() && r.end >= 0.0)
        .map(|r| BufferedRange {
            start: if r.start.is_finite() && r.start >= 0.0 {
                r.start
            } else {
                0.0
            },
            end: r.end,
        });

    let mut last_end = None;
    for range in usable {
        if range.start < current_time && current_time < range.end {
            return range.end;
        }
        last_end = Some(range.end);
    }

    last_end.unwrap_or(0.0)
}
