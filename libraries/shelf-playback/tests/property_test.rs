//! Property-based tests for buffer tracking
//!
//! Uses proptest to check `buffered_until` over random ordered range lists.

use proptest::prelude::*;
use shelf_playback::{buffered_until, BufferedRange};

// ===== Helpers =====

/// Ordered, non-overlapping ranges built from (gap, length) pairs
fn arbitrary_ranges() -> impl Strategy<Value = Vec<BufferedRange>> {
    prop::collection::vec((0.0f64..20.0, 0.1f64..30.0), 0..12).prop_map(|spans| {
        let mut cursor = 0.0;
        spans
            .into_iter()
            .map(|(gap, length)| {
                let start = cursor + gap;
                cursor = start + length;
                BufferedRange::new(start, cursor)
            })
            .collect()
    })
}

// ===== Property Tests =====

proptest! {
    /// Property: the answer is 0 or the end of one of the ranges
    #[test]
    fn result_is_a_range_end_or_zero(
        ranges in arbitrary_ranges(),
        current in 0.0f64..500.0,
    ) {
        let result = buffered_until(&ranges, current);

        if ranges.is_empty() {
            prop_assert_eq!(result, 0.0);
        } else {
            prop_assert!(ranges.iter().any(|r| r.end == result));
        }
    }

    /// Property: a position strictly inside a range reports that range's end
    #[test]
    fn containing_range_wins(
        ranges in arbitrary_ranges(),
        pick in any::<prop::sample::Index>(),
        fraction in 0.01f64..0.99,
    ) {
        prop_assume!(!ranges.is_empty());
        let range = ranges[pick.index(ranges.len())];
        let current = range.start + (range.end - range.start) * fraction;
        prop_assume!(range.start < current && current < range.end);

        prop_assert_eq!(buffered_until(&ranges, current), range.end);
    }

    /// Property: outside every range the last end is reported
    #[test]
    fn outside_ranges_reports_last_end(ranges in arbitrary_ranges(), beyond in 0.0f64..100.0) {
        prop_assume!(!ranges.is_empty());
        let last = ranges[ranges.len() - 1].end;

        prop_assert_eq!(buffered_until(&ranges, last + beyond), last);
    }

    /// Property: unusable ranges never leak into the answer
    #[test]
    fn unusable_ends_are_ignored(ranges in arbitrary_ranges(), current in 0.0f64..500.0) {
        let mut polluted = ranges.clone();
        polluted.push(BufferedRange::new(0.0, f64::NAN));
        polluted.insert(0, BufferedRange::new(0.0, f64::INFINITY));

        let result = buffered_until(&polluted, current);
        prop_assert!(result.is_finite());
        prop_assert_eq!(result, buffered_until(&ranges, current));
    }
}
