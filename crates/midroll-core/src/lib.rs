//! Midroll Core - Ad Insertion & Watch-Progress Engine
//!
//! This crate provides client-side ad insertion for media players:
//! - Pre-roll, mid-roll, and post-roll break sequencing
//! - VAST-style tracking beacons, fired exactly once per ad
//! - Skip eligibility countdowns and click-through handling
//! - Component (host-rendered) ads alongside media ads
//! - Watch-progress accounting with a sticky fully-watched latch
//!
//! The engine drives two [`MediaSurface`]s (content and ads) and is itself
//! driven by the signals those surfaces report back. It never touches real
//! media; the host owns rendering.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Midroll Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │    Break     │  │   Playback   │  │    Watch     │          │
//! │  │  Sequencer   │  │  Controller  │  │   Progress   │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │     Ad      │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │   Tracking   │  │    Media    │  │   Trigger    │           │
//! │  │  Dispatcher  │  │  Surfaces   │  │     Bus      │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod intervals;
pub mod media;
pub mod tracking;
pub mod progress;
pub mod sequencer;
pub mod controller;
pub mod hooks;
pub mod bus;
pub mod session;

pub use error::{Error, Result};
pub use types::*;
pub use media::{MediaSignal, MediaSurface, NullSurface};
pub use tracking::{FiredBeacon, HttpTransport, NullTransport, TrackingDispatcher, TrackingTransport};
pub use progress::{WatchProgressTracker, FULLY_WATCHED_THRESHOLD};
pub use sequencer::{AdBreakSequencer, SequencerState};
pub use controller::{AdOutcome, AdPlaybackController};
pub use hooks::AdEventHooks;
pub use bus::{AdTrigger, AdTriggerBus};
pub use session::AdSession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the engine library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Midroll Core initialized");
}
