//! Core types for the ad insertion engine

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{Error, Result};

/// Unique identifier for an ad session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Ad Data Model
// =============================================================================

/// Where an ad break sits relative to the content timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakPosition {
    /// Before content playback starts
    PreRoll,
    /// At a trigger time within the content
    MidRoll,
    /// After content playback ends
    PostRoll,
}

impl std::fmt::Display for BreakPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakPosition::PreRoll => write!(f, "pre-roll"),
            BreakPosition::MidRoll => write!(f, "mid-roll"),
            BreakPosition::PostRoll => write!(f, "post-roll"),
        }
    }
}

/// What actually plays when an ad runs.
///
/// Decided at construction: a media ad has a playable source for the ad
/// surface, a component ad is rendered by the host (overlay, interactive
/// card) and only reports back into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdSource {
    /// Playable creative loaded into the ad media surface
    Media { src: Url },
    /// Host-rendered creative identified by component id
    #[serde(rename_all = "camelCase")]
    Component { component_id: String },
}

/// Per-ad skip policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipPolicy {
    /// Fall back to the session-wide default
    #[default]
    Inherit,
    /// Never skippable
    Never,
    /// Skippable after this many seconds (0 = immediately)
    After(f64),
}

/// VAST-style quartile milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Quartile {
    First,
    Midpoint,
    Third,
}

impl Quartile {
    pub const ALL: [Quartile; 3] = [Quartile::First, Quartile::Midpoint, Quartile::Third];

    /// Percentage of the ad at which this quartile fires
    pub fn threshold(&self) -> f64 {
        match self {
            Quartile::First => 25.0,
            Quartile::Midpoint => 50.0,
            Quartile::Third => 75.0,
        }
    }

    /// VAST tracking event name
    pub fn tracking_name(&self) -> &'static str {
        match self {
            Quartile::First => "firstQuartile",
            Quartile::Midpoint => "midpoint",
            Quartile::Third => "thirdQuartile",
        }
    }
}

impl std::fmt::Display for Quartile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tracking_name())
    }
}

/// Custom progress tracking point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTracking {
    /// Seconds into the ad at which to fire
    pub offset: f64,
    /// Endpoint to hit
    pub url: Url,
}

/// Tracking endpoints for one ad, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingUrls {
    pub impression: Option<Url>,
    pub start: Option<Url>,
    pub first_quartile: Option<Url>,
    pub midpoint: Option<Url>,
    pub third_quartile: Option<Url>,
    pub complete: Option<Url>,
    pub skip: Option<Url>,
    pub click: Option<Url>,
    pub error: Option<Url>,
    pub pause: Option<Url>,
    pub resume: Option<Url>,
    /// Custom offset-based tracking points
    pub progress: Vec<ProgressTracking>,
}

impl TrackingUrls {
    /// Endpoint for a quartile milestone
    pub fn quartile_url(&self, quartile: Quartile) -> Option<&Url> {
        match quartile {
            Quartile::First => self.first_quartile.as_ref(),
            Quartile::Midpoint => self.midpoint.as_ref(),
            Quartile::Third => self.third_quartile.as_ref(),
        }
    }
}

/// A single ad within a break
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    /// Unique identifier
    pub id: String,
    /// Media or component creative
    pub source: AdSource,
    /// Duration in seconds. Authoritative wall-clock length for component
    /// ads; a starting estimate for media ads until the surface reports one.
    pub duration: f64,
    /// Skip policy for this ad
    #[serde(default)]
    pub skip: SkipPolicy,
    /// Landing page opened on click-through
    #[serde(default)]
    pub click_through_url: Option<Url>,
    /// Tracking endpoints
    #[serde(default)]
    pub tracking: TrackingUrls,
}

impl Ad {
    /// Create a media ad
    pub fn media(id: impl Into<String>, src: Url, duration: f64) -> Self {
        Self {
            id: id.into(),
            source: AdSource::Media { src },
            duration,
            skip: SkipPolicy::Inherit,
            click_through_url: None,
            tracking: TrackingUrls::default(),
        }
    }

    /// Create a component ad
    pub fn component(id: impl Into<String>, component_id: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            source: AdSource::Component {
                component_id: component_id.into(),
            },
            duration,
            skip: SkipPolicy::Inherit,
            click_through_url: None,
            tracking: TrackingUrls::default(),
        }
    }

    /// Set the skip policy
    pub fn with_skip(mut self, skip: SkipPolicy) -> Self {
        self.skip = skip;
        self
    }

    /// Set the click-through landing page
    pub fn with_click_through(mut self, url: Url) -> Self {
        self.click_through_url = Some(url);
        self
    }

    /// Set the tracking endpoints
    pub fn with_tracking(mut self, tracking: TrackingUrls) -> Self {
        self.tracking = tracking;
        self
    }

    /// True for host-rendered component ads
    pub fn is_component(&self) -> bool {
        matches!(self.source, AdSource::Component { .. })
    }

    /// Playable source, if this is a media ad
    pub fn media_src(&self) -> Option<&Url> {
        match &self.source {
            AdSource::Media { src } => Some(src),
            AdSource::Component { .. } => None,
        }
    }
}

/// A sequence of ads played together at one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdBreak {
    /// Unique identifier
    pub id: String,
    /// Timeline position
    pub position: BreakPosition,
    /// Content time that triggers a mid-roll. Ignored for pre/post-roll; a
    /// mid-roll without one is only reachable through the manual trigger API.
    #[serde(default)]
    pub trigger_time: Option<f64>,
    /// Ads in playback order
    #[serde(default)]
    pub ads: Vec<Ad>,
}

impl AdBreak {
    /// Create an empty break
    pub fn new(id: impl Into<String>, position: BreakPosition) -> Self {
        Self {
            id: id.into(),
            position,
            trigger_time: None,
            ads: Vec::new(),
        }
    }

    /// Set the mid-roll trigger time
    pub fn with_trigger_time(mut self, trigger_time: f64) -> Self {
        self.trigger_time = Some(trigger_time);
        self
    }

    /// Set the ads
    pub fn with_ads(mut self, ads: Vec<Ad>) -> Self {
        self.ads = ads;
        self
    }

    /// A break with no ads never plays
    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Ad session configuration, supplied once and immutable for the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdsConfig {
    /// Scheduled ad breaks
    pub breaks: Vec<AdBreak>,
    /// Global skip switch; false makes every ad unskippable
    pub skip_enabled: bool,
    /// Default skip-after seconds for ads with `SkipPolicy::Inherit`
    pub default_skip_after: Option<f64>,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            breaks: Vec::new(),
            skip_enabled: true,
            default_skip_after: None,
        }
    }
}

impl AdsConfig {
    /// Parse a configuration from host-supplied JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

// =============================================================================
// Playback State
// =============================================================================

/// Snapshot of ad playback, broadcast to the UI on every change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdPlaybackState {
    /// An ad is currently on screen
    pub is_playing_ad: bool,
    /// The ad being played (set together with `current_ad_break`)
    pub current_ad: Option<Ad>,
    /// The break being played (set together with `current_ad`)
    pub current_ad_break: Option<AdBreak>,
    /// Seconds into the current ad
    pub ad_progress: f64,
    /// Duration of the current ad in seconds
    pub ad_duration: f64,
    /// Skip is available right now
    pub can_skip: bool,
    /// Seconds until skippable; 0 once skippable (or never skippable)
    pub skip_countdown: f64,
    /// Ads left in the break after the current one
    pub ads_remaining: usize,
    /// Current ad is host-rendered
    pub is_component_ad: bool,
}

/// One watched span of the content timeline, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedSegment {
    pub start: f64,
    pub end: f64,
}

impl WatchedSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Seconds covered by this segment
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Watch-progress snapshot for the current content item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchProgress {
    /// Merged, sorted, non-overlapping watched spans
    pub watched_segments: Vec<WatchedSegment>,
    /// Percent of the content covered, clamped to 100
    pub percentage_watched: f64,
    /// Sticky once coverage reaches the fully-watched threshold
    pub is_fully_watched: bool,
    /// Furthest content time reached during playback
    pub furthest_point: f64,
}

// =============================================================================
// Lifecycle Events
// =============================================================================

/// Externally observable ad lifecycle moments.
///
/// Every tracking fire and hook call is derived from one of these, so an
/// event carries everything needed to act on it after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AdEvent {
    /// A break started playing
    BreakStarted { ad_break: AdBreak },

    /// An ad started (impression + start fire here)
    AdStarted { ad: Ad },

    /// Progress tick for the current ad
    AdProgress { elapsed: f64, duration: f64 },

    /// A quartile milestone was crossed for the first time
    QuartileReached { ad: Ad, quartile: Quartile },

    /// A custom progress offset was crossed for the first time
    ProgressMarker { ad_id: String, offset: f64, url: Url },

    /// The ad surface paused mid-ad
    AdPaused { ad: Ad },

    /// The ad surface resumed after a pause
    AdResumed { ad: Ad },

    /// The viewer skipped the ad
    AdSkipped { ad: Ad },

    /// The ad played to completion
    AdCompleted { ad: Ad },

    /// The ad failed; the whole break is aborted
    AdError { ad: Ad, message: String },

    /// The viewer clicked the ad
    ClickThrough { ad: Ad, url: Option<Url> },

    /// Every ad in the break has finished
    BreakFinished {
        break_id: String,
        position: BreakPosition,
    },
}

/// Watch-progress lifecycle moments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Coverage recomputed
    Progress { progress: WatchProgress },

    /// Coverage crossed the fully-watched threshold (fires once per item)
    Finished,
}
