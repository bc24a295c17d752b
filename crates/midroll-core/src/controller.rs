//! Per-ad playback control
//!
//! Tracks exactly one ad at a time: its progress, its skip countdown, and
//! which tracking points have fired. The controller never talks to surfaces
//! or the network; it returns the events and commands each transition implies
//! and lets the session act on them.
//!
//! Exactly-once firing is enforced here. Quartiles and custom progress
//! offsets are recorded in per-ad ledgers that are wiped when the next ad
//! begins, so a seek back inside the same ad never re-fires a point, while
//! the same creative in a later slot fires fresh.

use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::{Ad, AdBreak, AdEvent, AdPlaybackState, AdsConfig, Quartile, SkipPolicy};

/// Cadence of synthetic progress ticks for component ads
pub const AD_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Cadence of the skip countdown
pub const SKIP_COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// How an ad left the screen
#[derive(Debug, Clone, PartialEq)]
pub enum AdOutcome {
    /// Played to its end
    Completed,
    /// Viewer skipped after the countdown
    Skipped,
    /// Playback failed; the break is abandoned
    Failed { message: String },
}

/// What the session must do to put an ad on screen.
///
/// Produced by [`AdPlaybackController::begin`]; the session loads the media
/// or spawns the component timer, then dispatches the events.
#[derive(Debug, Default)]
pub struct AdStartPlan {
    /// Media source to load into the ad surface, for media ads
    pub load: Option<url::Url>,
    /// Spawn the synthetic progress timer, for component ads
    pub component_timer: bool,
    /// Spawn the skip countdown, seeded with this many seconds
    pub skip_timer_after: Option<f64>,
    /// Events to dispatch once commands have been issued
    pub events: Vec<AdEvent>,
}

/// State machine for the ad currently on screen
#[derive(Debug, Default)]
pub struct AdPlaybackController {
    state: AdPlaybackState,
    /// Quartiles fired for the current ad
    fired_quartiles: HashSet<Quartile>,
    /// Indexes into `tracking.progress` fired for the current ad
    fired_offsets: HashSet<usize>,
    /// The ad surface reported its first play
    media_started: bool,
    /// Start of synthetic playback, for component ads
    component_started_at: Option<tokio::time::Instant>,
    skip_timer: Option<JoinHandle<()>>,
    progress_timer: Option<JoinHandle<()>>,
    /// Bumped on every begin/finish/reset; stale timer ticks check it and bail
    epoch: u64,
}

impl AdPlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AdPlaybackState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Take over playback for `ad_break.ads[index]`.
    ///
    /// Clears the firing ledgers, computes skip eligibility from the ad's
    /// policy and the config, and returns the plan the session executes.
    pub fn begin(&mut self, ad_break: &AdBreak, index: usize, config: &AdsConfig) -> AdStartPlan {
        self.cancel_timers();
        self.epoch += 1;
        self.fired_quartiles.clear();
        self.fired_offsets.clear();
        self.media_started = false;
        self.component_started_at = None;

        let Some(ad) = ad_break.ads.get(index) else {
            return AdStartPlan::default();
        };

        let skip_after = Self::effective_skip_after(ad, config);
        let (can_skip, skip_countdown) = match skip_after {
            None => (false, 0.0),
            Some(secs) if secs <= 0.0 => (true, 0.0),
            Some(secs) => (false, secs),
        };

        self.state = AdPlaybackState {
            is_playing_ad: true,
            current_ad: Some(ad.clone()),
            current_ad_break: Some(ad_break.clone()),
            ad_progress: 0.0,
            ad_duration: ad.duration,
            can_skip,
            skip_countdown,
            ads_remaining: ad_break.ads.len() - index - 1,
            is_component_ad: ad.is_component(),
        };

        if ad.is_component() {
            self.component_started_at = Some(tokio::time::Instant::now());
        }

        debug!(
            ad_id = %ad.id,
            component = ad.is_component(),
            can_skip,
            skip_countdown,
            "Ad playback beginning"
        );

        AdStartPlan {
            load: ad.media_src().cloned(),
            component_timer: ad.is_component(),
            skip_timer_after: skip_after.filter(|s| *s > 0.0),
            events: vec![AdEvent::AdStarted { ad: ad.clone() }],
        }
    }

    /// Resolve an ad's skip policy against the session config.
    ///
    /// `None` means never skippable. A global `skip_enabled: false` wins over
    /// everything the ad declares.
    fn effective_skip_after(ad: &Ad, config: &AdsConfig) -> Option<f64> {
        if !config.skip_enabled {
            return None;
        }
        match ad.skip {
            SkipPolicy::Never => None,
            SkipPolicy::After(secs) => Some(secs.max(0.0)),
            SkipPolicy::Inherit => config.default_skip_after,
        }
    }

    /// Record playback progress and fire any tracking points crossed.
    ///
    /// `elapsed` is seconds into the ad, from the surface for media ads or
    /// the synthetic timer for component ads.
    pub fn on_progress(&mut self, elapsed: f64) -> Vec<AdEvent> {
        let Some(ad) = self.state.current_ad.clone() else {
            return Vec::new();
        };

        self.state.ad_progress = elapsed;
        let duration = self.state.ad_duration;

        let mut events = vec![AdEvent::AdProgress { elapsed, duration }];

        if duration > 0.0 {
            let pct = elapsed / duration * 100.0;
            for quartile in Quartile::ALL {
                if pct >= quartile.threshold() && self.fired_quartiles.insert(quartile) {
                    events.push(AdEvent::QuartileReached {
                        ad: ad.clone(),
                        quartile,
                    });
                }
            }
        }

        for (i, marker) in ad.tracking.progress.iter().enumerate() {
            if elapsed >= marker.offset && self.fired_offsets.insert(i) {
                events.push(AdEvent::ProgressMarker {
                    ad_id: ad.id.clone(),
                    offset: marker.offset,
                    url: marker.url.clone(),
                });
            }
        }

        events
    }

    /// The surface reported an authoritative duration; it overrides the
    /// configured one for quartile math.
    pub fn set_duration(&mut self, duration: f64) {
        if duration > 0.0 && self.state.is_playing_ad {
            self.state.ad_duration = duration;
        }
    }

    /// The ad surface started or resumed playing
    pub fn on_media_play(&mut self) -> Option<AdEvent> {
        let ad = self.state.current_ad.as_ref()?;
        if self.media_started {
            Some(AdEvent::AdResumed { ad: ad.clone() })
        } else {
            self.media_started = true;
            None
        }
    }

    /// The ad surface paused
    pub fn on_media_pause(&mut self) -> Option<AdEvent> {
        if !self.media_started {
            return None;
        }
        let ad = self.state.current_ad.as_ref()?;
        Some(AdEvent::AdPaused { ad: ad.clone() })
    }

    /// One second elapsed on the skip countdown.
    ///
    /// Returns `true` when the countdown hit zero and the ad became
    /// skippable; the timer should stop ticking.
    pub fn on_skip_tick(&mut self) -> bool {
        let next = (self.state.skip_countdown - 1.0).max(0.0);
        self.state.skip_countdown = next;
        if next <= 0.0 {
            self.state.can_skip = true;
            debug!("Skip countdown finished");
            true
        } else {
            false
        }
    }

    /// Seconds of synthetic playback for the current component ad
    pub fn component_elapsed(&self) -> Option<f64> {
        self.component_started_at
            .map(|started| started.elapsed().as_secs_f64())
    }

    /// The current ad is done; emit its terminal event.
    ///
    /// Idempotent: a second call with no ad in flight returns nothing, which
    /// is what makes racing completion paths (surface `Ended` vs the
    /// component timer) safe.
    pub fn finish(&mut self, outcome: &AdOutcome) -> Vec<AdEvent> {
        let Some(ad) = self.state.current_ad.take() else {
            return Vec::new();
        };

        self.cancel_timers();
        self.epoch += 1;
        self.media_started = false;
        self.component_started_at = None;
        self.state.ad_progress = 0.0;
        self.state.can_skip = false;
        self.state.skip_countdown = 0.0;

        debug!(ad_id = %ad.id, outcome = ?outcome, "Ad playback finished");

        match outcome {
            AdOutcome::Completed => vec![AdEvent::AdCompleted { ad }],
            AdOutcome::Skipped => vec![AdEvent::AdSkipped { ad }],
            AdOutcome::Failed { message } => vec![AdEvent::AdError {
                ad,
                message: message.clone(),
            }],
        }
    }

    /// The viewer clicked through the current ad
    pub fn click(&self) -> Option<AdEvent> {
        let ad = self.state.current_ad.as_ref()?;
        Some(AdEvent::ClickThrough {
            ad: ad.clone(),
            url: ad.click_through_url.clone(),
        })
    }

    /// Drop everything: timers, ledgers, state. Used when a break ends or
    /// the session is torn down.
    pub fn reset(&mut self) {
        self.cancel_timers();
        self.epoch += 1;
        self.fired_quartiles.clear();
        self.fired_offsets.clear();
        self.media_started = false;
        self.component_started_at = None;
        self.state = AdPlaybackState::default();
    }

    pub(crate) fn set_skip_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.skip_timer.replace(handle) {
            old.abort();
        }
    }

    pub(crate) fn set_progress_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.progress_timer.replace(handle) {
            old.abort();
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.skip_timer.take() {
            handle.abort();
        }
        if let Some(handle) = self.progress_timer.take() {
            handle.abort();
        }
    }
}

impl Drop for AdPlaybackController {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}
