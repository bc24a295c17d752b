//! Watch-progress tracking
//!
//! Accounts for which parts of the content timeline were actually watched.
//! An open segment starts when playback starts and closes on pause, seek, ad
//! interruption, or end; closed segments feed the interval merger. Coverage
//! percentage and the fully-watched flag recompute on every time tick with
//! the open segment counted provisionally, so consumers see progress move
//! during uninterrupted playback, not only at segment boundaries.

use tracing::debug;

use crate::intervals;
use crate::types::{WatchEvent, WatchProgress, WatchedSegment};

/// Coverage percentage at which content counts as fully watched
pub const FULLY_WATCHED_THRESHOLD: f64 = 95.0;

/// Position jump treated as a seek rather than normal tick cadence (seconds)
pub const SEEK_JUMP_THRESHOLD: f64 = 1.0;

/// Watch-progress state machine for one content item.
///
/// Positions arrive from content surface signals. The fully-watched flag is
/// sticky: once set it survives any further seeking and only a
/// [`reset`](Self::reset) (content source change) clears it.
#[derive(Debug, Default)]
pub struct WatchProgressTracker {
    /// Canonical merged segments, closed only
    segments: Vec<WatchedSegment>,
    /// Start of the currently open segment, if playing
    open_start: Option<f64>,
    /// Last position reported by the surface
    last_position: f64,
    /// High-water mark of playback position
    furthest_point: f64,
    /// Content duration, once known
    duration: Option<f64>,
    /// Sticky fully-watched flag
    fully_watched: bool,
}

impl WatchProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content duration became known
    pub fn set_duration(&mut self, duration: f64) -> Vec<WatchEvent> {
        if duration <= 0.0 {
            return Vec::new();
        }
        self.duration = Some(duration);
        self.recompute()
    }

    /// Known content duration
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Playback started or resumed at `position`
    pub fn on_playing(&mut self, position: f64) -> Vec<WatchEvent> {
        if self.open_start.is_none() {
            self.open_start = Some(position);
        }
        self.last_position = position;
        if position > self.furthest_point {
            self.furthest_point = position;
        }
        self.recompute()
    }

    /// Playback stopped at `position` (pause, ad interruption, surface error)
    pub fn on_paused(&mut self, position: f64) -> Vec<WatchEvent> {
        if self.open_start.is_none() {
            return Vec::new();
        }
        // A pause landing behind the open segment (racing a backward seek)
        // closes at the furthest observed position instead
        let end = if position + SEEK_JUMP_THRESHOLD < self.last_position {
            self.last_position
        } else {
            position
        };
        if end > self.furthest_point {
            self.furthest_point = end;
        }
        self.close_segment(end);
        self.recompute()
    }

    /// Periodic position report while the content surface is active
    pub fn on_time(&mut self, position: f64) -> Vec<WatchEvent> {
        if self.open_start.is_none() {
            // Paused scrubbing: remember where we are, account nothing
            self.last_position = position;
            return Vec::new();
        }

        if (position - self.last_position).abs() > SEEK_JUMP_THRESHOLD {
            let previous = self.last_position;
            debug!(from = previous, to = position, "Seek detected");
            self.close_segment(previous);
            self.open_start = Some(position);
        }

        self.last_position = position;
        if position > self.furthest_point {
            self.furthest_point = position;
        }
        self.recompute()
    }

    /// Content reached its end
    pub fn on_ended(&mut self, position: f64) -> Vec<WatchEvent> {
        let end = self.duration.unwrap_or(position).max(position);
        if self.open_start.is_some() {
            self.close_segment(end);
        }
        if end > self.furthest_point {
            self.furthest_point = end;
        }
        self.recompute()
    }

    /// Content source changed; everything starts over
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Sticky fully-watched flag
    pub fn is_fully_watched(&self) -> bool {
        self.fully_watched
    }

    /// Current snapshot, open segment included
    pub fn snapshot(&self) -> WatchProgress {
        let segments = self.provisional_segments();
        WatchProgress {
            percentage_watched: self.percentage_of(&segments),
            watched_segments: segments,
            is_fully_watched: self.fully_watched,
            furthest_point: self.furthest_point,
        }
    }

    /// Close the open segment at `end`; zero or negative spans are dropped
    fn close_segment(&mut self, end: f64) {
        if let Some(start) = self.open_start.take() {
            if end > start {
                self.segments.push(WatchedSegment::new(start, end));
                self.segments = intervals::merge(&self.segments);
            }
        }
    }

    /// Canonical segments plus the open one up to the last position
    fn provisional_segments(&self) -> Vec<WatchedSegment> {
        match self.open_start {
            Some(start) if self.last_position > start => {
                let mut segments = self.segments.clone();
                segments.push(WatchedSegment::new(start, self.last_position));
                intervals::merge(&segments)
            }
            _ => self.segments.clone(),
        }
    }

    fn percentage_of(&self, segments: &[WatchedSegment]) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => {
                (intervals::covered_duration(segments) / duration * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }

    /// Reassess coverage; latches the fully-watched flag exactly once
    fn recompute(&mut self) -> Vec<WatchEvent> {
        let segments = self.provisional_segments();
        let percentage = self.percentage_of(&segments);

        let mut events = Vec::with_capacity(2);
        let crossed = !self.fully_watched && percentage >= FULLY_WATCHED_THRESHOLD;
        if crossed {
            self.fully_watched = true;
            debug!(percentage, "Content fully watched");
        }

        events.push(WatchEvent::Progress {
            progress: WatchProgress {
                percentage_watched: percentage,
                watched_segments: segments,
                is_fully_watched: self.fully_watched,
                furthest_point: self.furthest_point,
            },
        });
        if crossed {
            events.push(WatchEvent::Finished);
        }
        events
    }
}
