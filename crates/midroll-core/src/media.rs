//! Media surface seam
//!
//! The engine never touches a DOM or a decoder. It issues commands to two
//! [`MediaSurface`] instances (content and ad playback) and consumes
//! [`MediaSignal`]s the host forwards back from them. Commands are
//! fire-and-forget; outcomes arrive as signals.

use serde::{Deserialize, Serialize};
use url::Url;

/// Command surface over a playback element.
///
/// Implementations wrap whatever actually plays media: a `<video>` element
/// bridge, a native pipeline, a test recorder. Calls must not block and must
/// not call back into the engine synchronously.
pub trait MediaSurface: Send + Sync {
    /// Set the playback source and begin loading
    fn load(&self, src: &Url);

    /// Begin or resume playback
    fn play(&self);

    /// Pause playback
    fn pause(&self);

    /// Jump to a position in seconds
    fn seek(&self, position: f64);

    /// Drop the current source and release the surface
    fn clear(&self);
}

/// Playback signals forwarded from a surface into the engine.
///
/// One shape serves both surfaces: the host routes content-element signals to
/// `handle_content_signal` and ad-element signals to `handle_ad_signal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum MediaSignal {
    /// Playback started or resumed
    Play,
    /// Playback paused
    Pause,
    /// Periodic position report (seconds)
    TimeUpdate { position: f64 },
    /// Duration became known or changed (seconds)
    DurationChanged { duration: f64 },
    /// Playback reached the end of the source
    Ended,
    /// The surface failed
    Error { message: String },
}

/// Surface that accepts every command and does nothing.
///
/// Stands in for the ad surface when a session only runs component ads, and
/// for either surface in tests that do not care about commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl MediaSurface for NullSurface {
    fn load(&self, _src: &Url) {}
    fn play(&self) {}
    fn pause(&self) {}
    fn seek(&self, _position: f64) {}
    fn clear(&self) {}
}
