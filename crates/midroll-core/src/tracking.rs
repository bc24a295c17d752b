//! Tracking beacon dispatch
//!
//! Fires VAST-style tracking pixels, fire-and-forget: a beacon is recorded,
//! handed to the transport on a background task, and never retried.
//! Transport failures are logged and swallowed; they must never disturb
//! playback. De-duplication (quartiles once per ad, and so on) is the
//! playback controller's job, not the dispatcher's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::Result;

/// Most recent beacons kept for inspection
const MAX_BEACON_LOG: usize = 256;

/// Network-call primitive behind the dispatcher.
///
/// The production transport is an HTTP GET; tests and dry runs swap in
/// no-op implementations.
#[async_trait]
pub trait TrackingTransport: Send + Sync {
    /// Deliver one beacon. Any response counts as delivered.
    async fn send(&self, url: &Url) -> Result<()>;
}

/// HTTP GET transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackingTransport for HttpTransport {
    async fn send(&self, url: &Url) -> Result<()> {
        // Status is irrelevant; reaching the server is the whole job
        self.client.get(url.clone()).send().await?;
        Ok(())
    }
}

/// Transport that drops every beacon, for dry runs and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl TrackingTransport for NullTransport {
    async fn send(&self, _url: &Url) -> Result<()> {
        Ok(())
    }
}

/// Record of one fired beacon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiredBeacon {
    /// Unique record id
    pub id: Uuid,
    /// Tracking event name ("impression", "firstQuartile", ...)
    pub name: String,
    /// Endpoint that was hit
    pub url: Url,
    /// When the beacon was fired
    pub at: DateTime<Utc>,
}

/// Fire-and-forget beacon dispatcher.
///
/// `fire` records the beacon synchronously and spawns the network send, so
/// callers can observe the fired log immediately. Must be used within a
/// Tokio runtime.
#[derive(Clone)]
pub struct TrackingDispatcher {
    transport: Arc<dyn TrackingTransport>,
    fired: Arc<Mutex<VecDeque<FiredBeacon>>>,
}

impl TrackingDispatcher {
    /// Create a dispatcher with the HTTP transport
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    /// Create a dispatcher with a custom transport
    pub fn with_transport(transport: Arc<dyn TrackingTransport>) -> Self {
        Self {
            transport,
            fired: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Fire one beacon. Never blocks, never fails.
    pub fn fire(&self, name: &str, url: &Url) {
        let beacon = FiredBeacon {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.clone(),
            at: Utc::now(),
        };

        debug!(name = %beacon.name, url = %beacon.url, "Tracking beacon fired");

        {
            let mut fired = self.fired.lock().unwrap_or_else(|e| e.into_inner());
            if fired.len() >= MAX_BEACON_LOG {
                fired.pop_front();
            }
            fired.push_back(beacon);
        }

        let transport = Arc::clone(&self.transport);
        let url = url.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = transport.send(&url).await {
                debug!(name = %name, url = %url, error = %e, "Tracking beacon failed");
            }
        });
    }

    /// Recently fired beacons, oldest first
    pub fn recent(&self) -> Vec<FiredBeacon> {
        self.fired
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Clear the fired log
    pub fn clear(&self) {
        self.fired.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for TrackingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrackingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingDispatcher")
            .field("fired", &self.recent().len())
            .finish()
    }
}
