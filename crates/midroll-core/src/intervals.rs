//! Watched-interval arithmetic
//!
//! Pure helpers shared by the watch-progress tracker: merge raw watched
//! segments into a canonical sorted, non-overlapping set and measure how
//! much of the timeline that set covers.

use crate::types::WatchedSegment;

/// Gap below which two segments count as contiguous (seconds).
///
/// Absorbs timeupdate jitter around pause/seek boundaries so a 0.3s hole
/// does not split an otherwise continuous viewing into two segments.
pub const SEGMENT_MERGE_TOLERANCE: f64 = 0.5;

/// Merge segments into a sorted, non-overlapping set.
///
/// Segments whose gap is within [`SEGMENT_MERGE_TOLERANCE`] are joined.
/// Deterministic and order-independent; merging an already merged set is a
/// no-op. Input segments must satisfy `end >= start`.
pub fn merge(segments: &[WatchedSegment]) -> Vec<WatchedSegment> {
    if segments.is_empty() {
        return Vec::new();
    }

    let mut sorted = segments.to_vec();
    for segment in &sorted {
        debug_assert!(
            segment.end >= segment.start,
            "segment ends before it starts: {:?}",
            segment
        );
    }
    sorted.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut merged = Vec::with_capacity(sorted.len());
    let mut current = sorted[0];

    for segment in sorted.into_iter().skip(1) {
        if segment.start <= current.end + SEGMENT_MERGE_TOLERANCE {
            // Contiguous or overlapping
            if segment.end > current.end {
                current.end = segment.end;
            }
        } else {
            merged.push(current);
            current = segment;
        }
    }
    merged.push(current);

    merged
}

/// Total seconds covered by a merged segment set.
///
/// Only meaningful on the output of [`merge`]; overlapping input
/// double-counts.
pub fn covered_duration(segments: &[WatchedSegment]) -> f64 {
    segments.iter().map(|s| s.duration()).sum()
}
