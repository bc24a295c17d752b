//! Host callback registry
//!
//! Hosts observe the engine two ways: the [`watch`](tokio::sync::watch) state
//! channel for UI binding, and these hooks for discrete moments (ad started,
//! quartile reached, content finished). Every hook is optional; an empty
//! registry is valid and silent.
//!
//! Hooks are invoked synchronously on the session task after the engine lock
//! is released. They must not call back into the session from inside the
//! callback; spawn if you need to.

use std::fmt;
use url::Url;

use crate::types::{Ad, AdEvent, Quartile, WatchEvent, WatchProgress};

/// Callback receiving the ad involved
pub type AdHook = Box<dyn Fn(&Ad) + Send + Sync>;
/// Callback with no payload
pub type NotifyHook = Box<dyn Fn() + Send + Sync>;
/// Callback receiving an error message
pub type ErrorHook = Box<dyn Fn(&str) + Send + Sync>;
/// Callback receiving `(elapsed, duration)` seconds
pub type ProgressHook = Box<dyn Fn(f64, f64) + Send + Sync>;
/// Callback receiving the clicked ad and its destination
pub type ClickHook = Box<dyn Fn(&Ad, Option<&Url>) + Send + Sync>;
/// Callback receiving a watch-progress snapshot
pub type WatchHook = Box<dyn Fn(&WatchProgress) + Send + Sync>;

/// Optional host callbacks for ad and watch-progress moments
#[derive(Default)]
pub struct AdEventHooks {
    pub on_ad_start: Option<AdHook>,
    pub on_ad_complete: Option<AdHook>,
    pub on_ad_skip: Option<AdHook>,
    pub on_first_quartile: Option<AdHook>,
    pub on_midpoint: Option<AdHook>,
    pub on_third_quartile: Option<AdHook>,
    /// The whole break finished and content is about to resume
    pub on_all_ads_complete: Option<NotifyHook>,
    pub on_ad_error: Option<ErrorHook>,
    pub on_ad_progress: Option<ProgressHook>,
    pub on_click_through: Option<ClickHook>,
    /// Watched coverage crossed the fully-watched threshold
    pub on_finished: Option<NotifyHook>,
    pub on_watch_progress_update: Option<WatchHook>,
}

impl AdEventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ad_start(mut self, f: impl Fn(&Ad) + Send + Sync + 'static) -> Self {
        self.on_ad_start = Some(Box::new(f));
        self
    }

    pub fn with_ad_complete(mut self, f: impl Fn(&Ad) + Send + Sync + 'static) -> Self {
        self.on_ad_complete = Some(Box::new(f));
        self
    }

    pub fn with_ad_skip(mut self, f: impl Fn(&Ad) + Send + Sync + 'static) -> Self {
        self.on_ad_skip = Some(Box::new(f));
        self
    }

    pub fn with_first_quartile(mut self, f: impl Fn(&Ad) + Send + Sync + 'static) -> Self {
        self.on_first_quartile = Some(Box::new(f));
        self
    }

    pub fn with_midpoint(mut self, f: impl Fn(&Ad) + Send + Sync + 'static) -> Self {
        self.on_midpoint = Some(Box::new(f));
        self
    }

    pub fn with_third_quartile(mut self, f: impl Fn(&Ad) + Send + Sync + 'static) -> Self {
        self.on_third_quartile = Some(Box::new(f));
        self
    }

    pub fn with_all_ads_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_all_ads_complete = Some(Box::new(f));
        self
    }

    pub fn with_ad_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_ad_error = Some(Box::new(f));
        self
    }

    pub fn with_ad_progress(mut self, f: impl Fn(f64, f64) + Send + Sync + 'static) -> Self {
        self.on_ad_progress = Some(Box::new(f));
        self
    }

    pub fn with_click_through(
        mut self,
        f: impl Fn(&Ad, Option<&Url>) + Send + Sync + 'static,
    ) -> Self {
        self.on_click_through = Some(Box::new(f));
        self
    }

    pub fn with_finished(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finished = Some(Box::new(f));
        self
    }

    pub fn with_watch_progress_update(
        mut self,
        f: impl Fn(&WatchProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_watch_progress_update = Some(Box::new(f));
        self
    }

    /// Route an ad event to its hook, if one is registered
    pub(crate) fn dispatch_ad(&self, event: &AdEvent) {
        match event {
            AdEvent::AdStarted { ad } => Self::invoke(&self.on_ad_start, ad),
            AdEvent::AdCompleted { ad } => Self::invoke(&self.on_ad_complete, ad),
            AdEvent::AdSkipped { ad } => Self::invoke(&self.on_ad_skip, ad),
            AdEvent::QuartileReached { ad, quartile } => match quartile {
                Quartile::First => Self::invoke(&self.on_first_quartile, ad),
                Quartile::Midpoint => Self::invoke(&self.on_midpoint, ad),
                Quartile::Third => Self::invoke(&self.on_third_quartile, ad),
            },
            AdEvent::AdProgress { elapsed, duration } => {
                if let Some(f) = &self.on_ad_progress {
                    f(*elapsed, *duration);
                }
            }
            AdEvent::AdError { message, .. } => {
                if let Some(f) = &self.on_ad_error {
                    f(message);
                }
            }
            AdEvent::ClickThrough { ad, url } => {
                if let Some(f) = &self.on_click_through {
                    f(ad, url.as_ref());
                }
            }
            AdEvent::BreakFinished { .. } => {
                if let Some(f) = &self.on_all_ads_complete {
                    f();
                }
            }
            // Observable through the state channel and the beacon log
            AdEvent::BreakStarted { .. }
            | AdEvent::ProgressMarker { .. }
            | AdEvent::AdPaused { .. }
            | AdEvent::AdResumed { .. } => {}
        }
    }

    /// Route a watch event to its hook, if one is registered
    pub(crate) fn dispatch_watch(&self, event: &WatchEvent) {
        match event {
            WatchEvent::Progress { progress } => {
                if let Some(f) = &self.on_watch_progress_update {
                    f(progress);
                }
            }
            WatchEvent::Finished => {
                if let Some(f) = &self.on_finished {
                    f();
                }
            }
        }
    }

    fn invoke(hook: &Option<AdHook>, ad: &Ad) {
        if let Some(f) = hook {
            f(ad);
        }
    }
}

impl fmt::Debug for AdEventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdEventHooks")
            .field("on_ad_start", &self.on_ad_start.is_some())
            .field("on_ad_complete", &self.on_ad_complete.is_some())
            .field("on_ad_skip", &self.on_ad_skip.is_some())
            .field("on_first_quartile", &self.on_first_quartile.is_some())
            .field("on_midpoint", &self.on_midpoint.is_some())
            .field("on_third_quartile", &self.on_third_quartile.is_some())
            .field("on_all_ads_complete", &self.on_all_ads_complete.is_some())
            .field("on_ad_error", &self.on_ad_error.is_some())
            .field("on_ad_progress", &self.on_ad_progress.is_some())
            .field("on_click_through", &self.on_click_through.is_some())
            .field("on_finished", &self.on_finished.is_some())
            .field(
                "on_watch_progress_update",
                &self.on_watch_progress_update.is_some(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_ad() -> Ad {
        Ad::media(
            "ad-1",
            Url::parse("https://ads.example.com/a.mp4").unwrap(),
            15.0,
        )
    }

    #[test]
    fn test_empty_hooks_are_silent() {
        let hooks = AdEventHooks::new();
        hooks.dispatch_ad(&AdEvent::AdStarted { ad: test_ad() });
        hooks.dispatch_watch(&WatchEvent::Finished);
    }

    #[test]
    fn test_quartile_routing() {
        let first = Arc::new(AtomicUsize::new(0));
        let mid = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let hooks = AdEventHooks::new()
            .with_first_quartile({
                let first = first.clone();
                move |_| {
                    first.fetch_add(1, Ordering::SeqCst);
                }
            })
            .with_midpoint({
                let mid = mid.clone();
                move |_| {
                    mid.fetch_add(1, Ordering::SeqCst);
                }
            })
            .with_third_quartile({
                let third = third.clone();
                move |_| {
                    third.fetch_add(1, Ordering::SeqCst);
                }
            });

        hooks.dispatch_ad(&AdEvent::QuartileReached {
            ad: test_ad(),
            quartile: Quartile::Midpoint,
        });
        hooks.dispatch_ad(&AdEvent::QuartileReached {
            ad: test_ad(),
            quartile: Quartile::Third,
        });

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(mid.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_break_finished_maps_to_all_ads_complete() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hooks = AdEventHooks::new().with_all_ads_complete({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        hooks.dispatch_ad(&AdEvent::BreakFinished {
            break_id: "brk".into(),
            position: crate::types::BreakPosition::PreRoll,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_click_through_receives_destination() {
        let seen = Arc::new(std::sync::Mutex::new(None::<String>));
        let hooks = AdEventHooks::new().with_click_through({
            let seen = seen.clone();
            move |_, url| {
                *seen.lock().unwrap() = url.map(|u| u.to_string());
            }
        });

        let dest = Url::parse("https://advertiser.example.com/landing").unwrap();
        hooks.dispatch_ad(&AdEvent::ClickThrough {
            ad: test_ad(),
            url: Some(dest.clone()),
        });
        assert_eq!(seen.lock().unwrap().as_deref(), Some(dest.as_str()));
    }

    #[test]
    fn test_watch_events() {
        let updates = Arc::new(AtomicUsize::new(0));
        let finishes = Arc::new(AtomicUsize::new(0));

        let hooks = AdEventHooks::new()
            .with_watch_progress_update({
                let updates = updates.clone();
                move |_| {
                    updates.fetch_add(1, Ordering::SeqCst);
                }
            })
            .with_finished({
                let finishes = finishes.clone();
                move || {
                    finishes.fetch_add(1, Ordering::SeqCst);
                }
            });

        hooks.dispatch_watch(&WatchEvent::Progress {
            progress: WatchProgress::default(),
        });
        hooks.dispatch_watch(&WatchEvent::Finished);

        assert_eq!(updates.load(Ordering::SeqCst), 1);
        assert_eq!(finishes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_lists_registered_hooks() {
        let hooks = AdEventHooks::new().with_ad_start(|_| {});
        let debug = format!("{hooks:?}");
        assert!(debug.contains("on_ad_start: true"));
        assert!(debug.contains("on_finished: false"));
    }
}
