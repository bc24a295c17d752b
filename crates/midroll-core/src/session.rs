//! Ad session - main orchestrator
//!
//! Coordinates:
//! - Break scheduling across pre/mid/post-roll
//! - Per-ad playback, skip eligibility, and tracking
//! - Watch-progress accounting for the content item
//! - Surface commands and host callbacks
//!
//! All mutable state lives behind one async mutex. Every entry point (host
//! call, surface signal, timer tick) locks, applies its transition, collects
//! the resulting events and surface commands, publishes the new state, and
//! only then, after the lock is released, fires tracking, hooks, and surface
//! calls. Events carry their own ad clones, so nothing dispatched after
//! unlock can race a later transition.

use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::bus::{AdTrigger, AdTriggerBus};
use crate::controller::{
    AdOutcome, AdPlaybackController, AD_PROGRESS_INTERVAL, SKIP_COUNTDOWN_INTERVAL,
};
use crate::hooks::AdEventHooks;
use crate::media::{MediaSignal, MediaSurface};
use crate::progress::WatchProgressTracker;
use crate::sequencer::{AdBreakSequencer, SequencerState};
use crate::tracking::{HttpTransport, TrackingDispatcher, TrackingTransport};
use crate::types::{
    AdBreak, AdEvent, AdPlaybackState, AdsConfig, SessionId, WatchEvent, WatchProgress,
};

/// Ad session managing one content item and its breaks
#[derive(Clone)]
pub struct AdSession {
    core: Arc<SessionCore>,
}

struct SessionCore {
    /// Unique session ID
    id: SessionId,
    /// Session configuration, immutable after creation
    config: AdsConfig,
    /// Host callbacks
    hooks: AdEventHooks,
    /// Tracking beacon dispatcher
    dispatcher: TrackingDispatcher,
    /// Surface playing the content item
    content: Arc<dyn MediaSurface>,
    /// Surface playing media ads
    ad_surface: Arc<dyn MediaSurface>,
    /// All mutable session state
    inner: Mutex<SessionInner>,
    /// State change broadcaster
    state_tx: watch::Sender<AdPlaybackState>,
}

struct SessionInner {
    sequencer: AdBreakSequencer,
    controller: AdPlaybackController,
    progress: WatchProgressTracker,
    /// Content surface is actively playing
    content_playing: bool,
    /// Last content position reported by the surface
    content_position: f64,
    /// Content should resume once the current break ends
    resume_after_break: bool,
    /// Position to seek back to on resume, if the break interrupted playback
    resume_position: Option<f64>,
}

/// Surface calls owed after a transition, issued outside the lock
enum SurfaceCmd {
    ContentLoad(Url),
    ContentPlay,
    ContentPause,
    ContentSeek(f64),
    AdLoad(Url),
    AdPlay,
    AdClear,
}

/// Everything a transition produced, dispatched after unlock
#[derive(Default)]
struct Effects {
    cmds: Vec<SurfaceCmd>,
    ad_events: Vec<AdEvent>,
    watch_events: Vec<WatchEvent>,
}

impl AdSession {
    /// Create a session firing beacons over HTTP
    pub fn new(
        config: AdsConfig,
        hooks: AdEventHooks,
        content: Arc<dyn MediaSurface>,
        ad_surface: Arc<dyn MediaSurface>,
    ) -> Self {
        Self::with_transport(config, hooks, content, ad_surface, Arc::new(HttpTransport::new()))
    }

    /// Create a session with a custom tracking transport
    pub fn with_transport(
        config: AdsConfig,
        hooks: AdEventHooks,
        content: Arc<dyn MediaSurface>,
        ad_surface: Arc<dyn MediaSurface>,
        transport: Arc<dyn TrackingTransport>,
    ) -> Self {
        let (state_tx, _) = watch::channel(AdPlaybackState::default());
        let sequencer = AdBreakSequencer::new(config.breaks.clone());

        let core = Arc::new(SessionCore {
            id: SessionId::new(),
            config,
            hooks,
            dispatcher: TrackingDispatcher::with_transport(transport),
            content,
            ad_surface,
            inner: Mutex::new(SessionInner {
                sequencer,
                controller: AdPlaybackController::new(),
                progress: WatchProgressTracker::new(),
                content_playing: false,
                content_position: 0.0,
                resume_after_break: false,
                resume_position: None,
            }),
            state_tx,
        });

        info!(
            session_id = %core.id,
            breaks = core.config.breaks.len(),
            "Ad session created"
        );
        Self { core }
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.core.id
    }

    /// Get session configuration
    pub fn config(&self) -> &AdsConfig {
        &self.core.config
    }

    /// Snapshot of the current ad playback state
    pub async fn ad_state(&self) -> AdPlaybackState {
        self.core.inner.lock().await.controller.state().clone()
    }

    /// Snapshot of watch progress for the content item
    pub async fn watch_progress(&self) -> WatchProgress {
        self.core.inner.lock().await.progress.snapshot()
    }

    /// Subscribe to ad playback state changes
    pub fn subscribe_state(&self) -> watch::Receiver<AdPlaybackState> {
        self.core.state_tx.subscribe()
    }

    /// The beacon dispatcher, exposing the fired-beacon log
    pub fn dispatcher(&self) -> &TrackingDispatcher {
        &self.core.dispatcher
    }

    /// The viewer asked to play content.
    ///
    /// An unplayed pre-roll intercepts the request; otherwise the play goes
    /// straight to the content surface. Ignored while a break is active.
    #[instrument(skip(self))]
    pub async fn request_play(&self) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            if inner.sequencer.is_break_active() {
                warn!("Play requested during an ad break, ignoring");
                return;
            }

            let pre_roll = inner.sequencer.pending_pre_roll().cloned();
            if let Some(ad_break) = pre_roll {
                inner.resume_after_break = true;
                inner.resume_position = None;
                SessionCore::begin_break(&self.core, &mut inner, &mut fx, ad_break, false);
            } else {
                fx.cmds.push(SurfaceCmd::ContentPlay);
            }
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Skip the current ad. No-op unless the countdown has finished.
    #[instrument(skip(self))]
    pub async fn skip_ad(&self) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            if !inner.controller.state().can_skip {
                warn!("Skip requested but the current ad is not skippable");
                return;
            }
            SessionCore::conclude_ad(&self.core, &mut inner, &mut fx, AdOutcome::Skipped);
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// The viewer clicked the current ad
    #[instrument(skip(self))]
    pub async fn ad_click_through(&self) {
        let mut fx = Effects::default();
        {
            let inner = self.core.inner.lock().await;
            match inner.controller.click() {
                Some(event) => fx.ad_events.push(event),
                None => {
                    debug!("Click-through with no ad playing, ignoring");
                    return;
                }
            }
        }
        self.core.dispatch(fx);
    }

    /// The host finished rendering a component ad early.
    ///
    /// Component ads normally complete when their configured duration
    /// elapses; interactive ones can finish sooner through this call.
    #[instrument(skip(self))]
    pub async fn complete_component_ad(&self) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            let state = inner.controller.state();
            if !state.is_playing_ad || !state.is_component_ad {
                warn!("No component ad to complete");
                return;
            }
            SessionCore::conclude_ad(&self.core, &mut inner, &mut fx, AdOutcome::Completed);
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Start a break immediately, outside the configured schedule.
    ///
    /// The break is remembered by id, so a bus replay cannot run it twice,
    /// but it never consumes the scheduled pre/post-roll slots.
    #[instrument(skip(self, ad_break), fields(break_id = %ad_break.id))]
    pub async fn start_ad_break(&self, ad_break: AdBreak) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            SessionCore::begin_break(&self.core, &mut inner, &mut fx, ad_break, true);
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Cancel ad playback without terminal ad events.
    ///
    /// Content resumes only if a break actually interrupted it.
    #[instrument(skip(self))]
    pub async fn stop_ads(&self) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            if !inner.sequencer.is_break_active() {
                debug!("Stop requested with no break active");
                return;
            }
            info!("Stopping ad playback");
            inner.sequencer.abort();
            self.core.finish_break(&mut inner, &mut fx);
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Load a new content item, resetting breaks and watch progress
    #[instrument(skip(self))]
    pub async fn set_content_source(&self, src: &Url) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            info!(src = %src, "Content source changed");
            inner.controller.reset();
            inner.sequencer.reset();
            inner.progress.reset();
            inner.content_playing = false;
            inner.content_position = 0.0;
            inner.resume_after_break = false;
            inner.resume_position = None;
            fx.cmds.push(SurfaceCmd::AdClear);
            fx.cmds.push(SurfaceCmd::ContentLoad(src.clone()));
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Feed a signal from the content surface
    #[instrument(skip(self))]
    pub async fn handle_content_signal(&self, signal: MediaSignal) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            match signal {
                MediaSignal::Play => {
                    if inner.sequencer.is_break_active() {
                        warn!("Content started during an ad break, re-pausing");
                        fx.cmds.push(SurfaceCmd::ContentPause);
                    } else {
                        inner.content_playing = true;
                        let position = inner.content_position;
                        fx.watch_events.extend(inner.progress.on_playing(position));
                    }
                }
                MediaSignal::Pause => {
                    if !inner.sequencer.is_break_active() {
                        inner.content_playing = false;
                        let position = inner.content_position;
                        fx.watch_events.extend(inner.progress.on_paused(position));
                    }
                }
                MediaSignal::TimeUpdate { position } => {
                    if !inner.sequencer.is_break_active() {
                        inner.content_position = position;
                        fx.watch_events.extend(inner.progress.on_time(position));

                        if inner.content_playing {
                            let due = inner.sequencer.due_mid_roll(position).cloned();
                            if let Some(ad_break) = due {
                                SessionCore::begin_break(
                                    &self.core, &mut inner, &mut fx, ad_break, false,
                                );
                            }
                        }
                    }
                }
                MediaSignal::DurationChanged { duration } => {
                    fx.watch_events.extend(inner.progress.set_duration(duration));
                }
                MediaSignal::Ended => {
                    if !inner.sequencer.is_break_active() {
                        inner.content_playing = false;
                        let position = inner.content_position;
                        fx.watch_events.extend(inner.progress.on_ended(position));

                        let post_roll = inner.sequencer.pending_post_roll().cloned();
                        if let Some(ad_break) = post_roll {
                            // Nothing to resume once content has ended
                            inner.resume_after_break = false;
                            inner.resume_position = None;
                            SessionCore::begin_break(
                                &self.core, &mut inner, &mut fx, ad_break, false,
                            );
                        }
                    }
                }
                MediaSignal::Error { message } => {
                    warn!(message = %message, "Content playback error");
                    if !inner.sequencer.is_break_active() {
                        inner.content_playing = false;
                        let position = inner.content_position;
                        fx.watch_events.extend(inner.progress.on_paused(position));
                    }
                }
            }
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Feed a signal from the ad surface
    #[instrument(skip(self))]
    pub async fn handle_ad_signal(&self, signal: MediaSignal) {
        let mut fx = Effects::default();
        {
            let mut inner = self.core.inner.lock().await;
            if !inner.controller.state().is_playing_ad {
                debug!("Ad surface signal with no ad playing, ignoring");
                return;
            }
            match signal {
                MediaSignal::Play => fx.ad_events.extend(inner.controller.on_media_play()),
                MediaSignal::Pause => fx.ad_events.extend(inner.controller.on_media_pause()),
                MediaSignal::TimeUpdate { position } => {
                    fx.ad_events.extend(inner.controller.on_progress(position));
                }
                MediaSignal::DurationChanged { duration } => {
                    inner.controller.set_duration(duration);
                }
                MediaSignal::Ended => {
                    SessionCore::conclude_ad(
                        &self.core,
                        &mut inner,
                        &mut fx,
                        AdOutcome::Completed,
                    );
                }
                MediaSignal::Error { message } => {
                    SessionCore::conclude_ad(
                        &self.core,
                        &mut inner,
                        &mut fx,
                        AdOutcome::Failed { message },
                    );
                }
            }
            self.core.publish_state(&inner);
        }
        self.core.dispatch(fx);
    }

    /// Drive this session from a trigger bus.
    ///
    /// The returned task ends when the bus closes or the session is dropped;
    /// it holds only a weak reference, so it never keeps a session alive.
    pub fn attach_trigger_bus(&self, bus: &AdTriggerBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let weak = Arc::downgrade(&self.core);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(trigger) => {
                        let Some(core) = weak.upgrade() else { break };
                        let session = AdSession { core };
                        match trigger {
                            AdTrigger::StartBreak { ad_break } => {
                                session.start_ad_break(ad_break).await;
                            }
                            AdTrigger::StopAds => session.stop_ads().await,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Trigger subscriber lagged, triggers dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl SessionCore {
    /// Interrupt content if needed and start the break's first ad
    fn begin_break(
        core: &Arc<SessionCore>,
        inner: &mut SessionInner,
        fx: &mut Effects,
        ad_break: AdBreak,
        manual: bool,
    ) {
        if ad_break.is_empty() {
            warn!(break_id = %ad_break.id, "Ignoring empty ad break");
            return;
        }
        if inner.sequencer.is_break_active() {
            warn!(break_id = %ad_break.id, "A break is already active, ignoring");
            return;
        }
        if inner.sequencer.has_played(&ad_break.id) {
            warn!(break_id = %ad_break.id, "Break already played, ignoring");
            return;
        }

        info!(
            break_id = %ad_break.id,
            position = %ad_break.position,
            ads = ad_break.ads.len(),
            "Starting ad break"
        );

        if inner.content_playing {
            let position = inner.content_position;
            fx.watch_events.extend(inner.progress.on_paused(position));
            inner.content_playing = false;
            inner.resume_after_break = true;
            inner.resume_position = Some(position);
            fx.cmds.push(SurfaceCmd::ContentPause);
        }

        inner.sequencer.arm(ad_break.position);
        inner.sequencer.begin(ad_break.clone(), manual);
        fx.ad_events.push(AdEvent::BreakStarted { ad_break });

        Self::start_next_ad(core, inner, fx);
    }

    /// Hand the sequencer's current ad to the controller and spawn its timers
    fn start_next_ad(core: &Arc<SessionCore>, inner: &mut SessionInner, fx: &mut Effects) {
        let Some((ad_break, index)) = inner.sequencer.current().map(|(b, i)| (b.clone(), i))
        else {
            return;
        };

        let plan = inner.controller.begin(&ad_break, index, &core.config);
        if let Some(src) = plan.load {
            fx.cmds.push(SurfaceCmd::AdLoad(src));
            fx.cmds.push(SurfaceCmd::AdPlay);
        }

        let epoch = inner.controller.epoch();
        if plan.component_timer {
            inner
                .controller
                .set_progress_timer(Self::spawn_component_timer(core, epoch));
        }
        if plan.skip_timer_after.is_some() {
            inner
                .controller
                .set_skip_timer(Self::spawn_skip_timer(core, epoch));
        }

        fx.ad_events.extend(plan.events);
    }

    /// Terminate the current ad and move the break forward.
    ///
    /// A failed ad abandons the whole break; anything else advances to the
    /// next ad or wraps the break up.
    fn conclude_ad(
        core: &Arc<SessionCore>,
        inner: &mut SessionInner,
        fx: &mut Effects,
        outcome: AdOutcome,
    ) {
        let failed = matches!(outcome, AdOutcome::Failed { .. });
        let events = inner.controller.finish(&outcome);
        if events.is_empty() {
            // No ad was in flight; a racing completion got here first
            return;
        }
        fx.ad_events.extend(events);

        if failed {
            warn!("Ad failed, abandoning the rest of the break");
            inner.sequencer.abort();
            core.finish_break(inner, fx);
            return;
        }

        if inner.sequencer.advance().is_some() {
            Self::start_next_ad(core, inner, fx);
            return;
        }

        if let SequencerState::BreakComplete { break_id, position } = inner.sequencer.state() {
            fx.ad_events.push(AdEvent::BreakFinished {
                break_id: break_id.clone(),
                position: *position,
            });
        }
        inner.sequencer.finish();
        core.finish_break(inner, fx);
    }

    /// Clear the ad surface and resume content if the break interrupted it
    fn finish_break(&self, inner: &mut SessionInner, fx: &mut Effects) {
        inner.controller.reset();
        fx.cmds.push(SurfaceCmd::AdClear);

        if inner.resume_after_break {
            inner.resume_after_break = false;
            if let Some(position) = inner.resume_position.take() {
                fx.cmds.push(SurfaceCmd::ContentSeek(position));
            }
            fx.cmds.push(SurfaceCmd::ContentPlay);
            info!("Resuming content after ad break");
        }
    }

    /// Countdown until the current ad becomes skippable.
    ///
    /// Ticks once per second; stops on its own when the countdown finishes,
    /// when the ad changes (epoch mismatch), or when the session drops.
    fn spawn_skip_timer(core: &Arc<SessionCore>, epoch: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(core);
        // Anchor the countdown at ad start, not at the task's first poll
        let first_tick = Instant::now() + SKIP_COUNTDOWN_INTERVAL;
        tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, SKIP_COUNTDOWN_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };
                let mut inner = core.inner.lock().await;
                if inner.controller.epoch() != epoch {
                    break;
                }
                let finished = inner.controller.on_skip_tick();
                core.publish_state(&inner);
                if finished {
                    break;
                }
            }
        })
    }

    /// Synthetic playback clock for component ads.
    ///
    /// Component ads have no media element reporting time, so this timer
    /// feeds progress and completes the ad when its duration elapses.
    fn spawn_component_timer(core: &Arc<SessionCore>, epoch: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(core);
        // Anchor synthetic playback at ad start, not at the task's first poll
        let first_tick = Instant::now() + AD_PROGRESS_INTERVAL;
        tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, AD_PROGRESS_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };

                let mut fx = Effects::default();
                let mut done = false;
                {
                    let mut inner = core.inner.lock().await;
                    if inner.controller.epoch() != epoch {
                        break;
                    }
                    let Some(elapsed) = inner.controller.component_elapsed() else {
                        break;
                    };
                    fx.ad_events.extend(inner.controller.on_progress(elapsed));

                    let duration = inner.controller.state().ad_duration;
                    if duration > 0.0 && elapsed >= duration {
                        SessionCore::conclude_ad(&core, &mut inner, &mut fx, AdOutcome::Completed);
                        done = true;
                    }
                    core.publish_state(&inner);
                }
                core.dispatch(fx);
                if done {
                    break;
                }
            }
        })
    }

    /// Broadcast the playback state if it actually changed
    fn publish_state(&self, inner: &SessionInner) {
        let state = inner.controller.state();
        self.state_tx.send_if_modified(|current| {
            if current == state {
                return false;
            }
            *current = state.clone();
            true
        });
    }

    /// Issue surface commands, then fire tracking and hooks
    fn dispatch(&self, fx: Effects) {
        for cmd in &fx.cmds {
            match cmd {
                SurfaceCmd::ContentLoad(src) => self.content.load(src),
                SurfaceCmd::ContentPlay => self.content.play(),
                SurfaceCmd::ContentPause => self.content.pause(),
                SurfaceCmd::ContentSeek(position) => self.content.seek(*position),
                SurfaceCmd::AdLoad(src) => self.ad_surface.load(src),
                SurfaceCmd::AdPlay => self.ad_surface.play(),
                SurfaceCmd::AdClear => self.ad_surface.clear(),
            }
        }
        for event in &fx.ad_events {
            self.fire_tracking(event);
            self.hooks.dispatch_ad(event);
        }
        for event in &fx.watch_events {
            self.hooks.dispatch_watch(event);
        }
    }

    /// Map an ad event to its tracking beacon, if the ad declares one
    fn fire_tracking(&self, event: &AdEvent) {
        match event {
            AdEvent::AdStarted { ad } => {
                if let Some(url) = &ad.tracking.impression {
                    self.dispatcher.fire("impression", url);
                }
                if let Some(url) = &ad.tracking.start {
                    self.dispatcher.fire("start", url);
                }
            }
            AdEvent::QuartileReached { ad, quartile } => {
                if let Some(url) = ad.tracking.quartile_url(*quartile) {
                    self.dispatcher.fire(quartile.tracking_name(), url);
                }
            }
            AdEvent::ProgressMarker { url, .. } => self.dispatcher.fire("progress", url),
            AdEvent::AdPaused { ad } => {
                if let Some(url) = &ad.tracking.pause {
                    self.dispatcher.fire("pause", url);
                }
            }
            AdEvent::AdResumed { ad } => {
                if let Some(url) = &ad.tracking.resume {
                    self.dispatcher.fire("resume", url);
                }
            }
            AdEvent::AdSkipped { ad } => {
                if let Some(url) = &ad.tracking.skip {
                    self.dispatcher.fire("skip", url);
                }
            }
            AdEvent::AdCompleted { ad } => {
                if let Some(url) = &ad.tracking.complete {
                    self.dispatcher.fire("complete", url);
                }
            }
            AdEvent::AdError { ad, .. } => {
                if let Some(url) = &ad.tracking.error {
                    self.dispatcher.fire("error", url);
                }
            }
            AdEvent::ClickThrough { ad, .. } => {
                if let Some(url) = &ad.tracking.click {
                    self.dispatcher.fire("click", url);
                }
            }
            AdEvent::BreakStarted { .. }
            | AdEvent::BreakFinished { .. }
            | AdEvent::AdProgress { .. } => {}
        }
    }
}
