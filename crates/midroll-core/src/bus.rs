//! Ad trigger bus
//!
//! Broadcast channel for injecting break commands from outside the session:
//! server-sent cue points, interactive overlays, operator tooling. Producers
//! hold a cheap [`AdTriggerBus`] clone; sessions subscribe through
//! [`AdSession::attach_trigger_bus`](crate::session::AdSession::attach_trigger_bus).
//!
//! Triggers sent with no subscriber are dropped, same as a cue point arriving
//! before any player exists.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::AdBreak;

const DEFAULT_CAPACITY: usize = 32;

/// Commands carried on the trigger bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "camelCase")]
pub enum AdTrigger {
    /// Start this break now, regardless of schedule
    #[serde(rename_all = "camelCase")]
    StartBreak { ad_break: AdBreak },
    /// Cancel any ad playback and resume content
    StopAds,
}

/// Clonable fan-out channel for [`AdTrigger`] commands
#[derive(Debug, Clone)]
pub struct AdTriggerBus {
    sender: broadcast::Sender<AdTrigger>,
}

impl AdTriggerBus {
    /// Create a bus buffering up to `capacity` undelivered triggers per
    /// subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send a trigger to all subscribed sessions
    pub fn trigger(&self, trigger: AdTrigger) {
        // Send fails only when nobody is subscribed
        let _ = self.sender.send(trigger);
    }

    /// Subscribe to triggers sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AdTrigger> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AdTriggerBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BreakPosition;

    #[test]
    fn test_trigger_without_subscribers_is_dropped() {
        let bus = AdTriggerBus::default();
        bus.trigger(AdTrigger::StopAds);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_trigger() {
        let bus = AdTriggerBus::new(8);
        let mut rx = bus.subscribe();

        bus.trigger(AdTrigger::StartBreak {
            ad_break: AdBreak::new("cue-1", BreakPosition::MidRoll),
        });

        match rx.recv().await.unwrap() {
            AdTrigger::StartBreak { ad_break } => assert_eq!(ad_break.id, "cue-1"),
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = AdTriggerBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.trigger(AdTrigger::StopAds);

        assert_eq!(a.recv().await.unwrap(), AdTrigger::StopAds);
        assert_eq!(b.recv().await.unwrap(), AdTrigger::StopAds);
    }

    #[test]
    fn test_trigger_serialization() {
        let json = serde_json::to_value(AdTrigger::StopAds).unwrap();
        assert_eq!(json["trigger"], "stopAds");
    }
}
