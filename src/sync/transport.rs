use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{LATEST_PATH, PUSH_PATH};
use crate::models::Reading;

// ---

/// Transport between the ingesting device and the companion display.
///
/// Both primitives are best effort. A failed push returns `false`, a failed
/// or empty pull returns `None`; neither surfaces an error.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, reading: &Reading) -> impl Future<Output = bool> + Send;

    fn fetch_latest(&self) -> impl Future<Output = Option<Reading>> + Send;

    /// False when pushes can never land, e.g. no companion address is known.
    fn has_push_target(&self) -> bool {
        true
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// HTTP transport. Push goes to the companion, pull reads the ingest service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    // ---
    client: reqwest::Client,
    push_url: Option<String>,
    pull_url: Option<String>,
}

impl HttpTransport {
    // ---
    pub fn new(timeout: Duration) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            push_url: None,
            pull_url: None,
        })
    }

    /// Push readings to the companion service at `base_url`.
    pub fn with_companion(mut self, base_url: &str) -> Self {
        self.push_url = Some(endpoint(base_url, PUSH_PATH));
        self
    }

    /// Pull the latest reading from the ingest service at `base_url`.
    pub fn with_ingest(mut self, base_url: &str) -> Self {
        self.pull_url = Some(endpoint(base_url, LATEST_PATH));
        self
    }
}

impl Transport for HttpTransport {
    fn has_push_target(&self) -> bool {
        self.push_url.is_some()
    }

    async fn send(&self, reading: &Reading) -> bool {
        // ---
        let Some(url) = &self.push_url else {
            debug!("No companion configured, dropping push");
            return false;
        };

        let result = self
            .client
            .post(url)
            .json(reading)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("Push to {} failed: {}", url, e);
                false
            }
        }
    }

    async fn fetch_latest(&self) -> Option<Reading> {
        // ---
        let url = self.pull_url.as_ref()?;

        let response = match self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Fetch from {} failed: {}", url, e);
                return None;
            }
        };

        match response.json::<Option<Reading>>().await {
            Ok(reading) => reading.filter(Reading::is_valid),
            Err(e) => {
                warn!("Unreadable payload from {}: {}", url, e);
                None
            }
        }
    }
}

#[derive(Debug)]
struct MemoryLink {
    slot: watch::Sender<Option<Reading>>,
    offline: AtomicBool,
    sent: AtomicUsize,
}

/// In-process transport: a shared delivery slot plus a change feed.
///
/// Clones share the same slot, so one clone can sit on the ingest side and
/// another on the companion side.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    link: Arc<MemoryLink>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    // ---
    pub fn new() -> Self {
        // ---
        let (slot, _) = watch::channel(None);
        Self {
            link: Arc::new(MemoryLink {
                slot,
                offline: AtomicBool::new(false),
                sent: AtomicUsize::new(0),
            }),
        }
    }

    /// Change feed of the delivery slot, one notification per push.
    pub fn subscribe(&self) -> watch::Receiver<Option<Reading>> {
        self.link.slot.subscribe()
    }

    /// Simulate the link going down: pushes fail and pulls return nothing.
    pub fn set_offline(&self, offline: bool) {
        self.link.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of pushes that reached the slot.
    pub fn delivered(&self) -> usize {
        self.link.sent.load(Ordering::SeqCst)
    }

    /// Seed the slot directly, as if a push had landed earlier.
    pub fn publish(&self, reading: Reading) {
        self.link.slot.send_replace(Some(reading));
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, reading: &Reading) -> bool {
        // ---
        if self.link.offline.load(Ordering::SeqCst) {
            return false;
        }
        self.publish(*reading);
        self.link.sent.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn fetch_latest(&self) -> Option<Reading> {
        // ---
        if self.link.offline.load(Ordering::SeqCst) {
            return None;
        }
        *self.link.slot.borrow()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::GlycemiaUnit;

    #[test]
    fn test_endpoint_joins_cleanly() {
        // ---
        assert_eq!(endpoint("http://watch:8081/", PUSH_PATH), "http://watch:8081/sync/push");
        assert_eq!(endpoint("http://phone:8080", LATEST_PATH), "http://phone:8080/sync/latest");
    }

    #[tokio::test]
    async fn test_http_transport_without_targets_is_inert() {
        // ---
        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let reading = Reading::new(6.0, GlycemiaUnit::MmolL, 1).unwrap();
        assert!(!transport.has_push_target());
        assert!(!transport.send(&reading).await);
        assert!(transport.fetch_latest().await.is_none());
    }

    #[tokio::test]
    async fn test_http_push_to_unreachable_companion_is_swallowed() {
        // ---
        let transport = HttpTransport::new(Duration::from_millis(200))
            .unwrap()
            .with_companion("http://127.0.0.1:9");
        assert!(transport.has_push_target());
        let reading = Reading::new(6.0, GlycemiaUnit::MmolL, 1).unwrap();
        assert!(!transport.send(&reading).await);
    }

    #[tokio::test]
    async fn test_memory_transport_round_trip_and_outage() {
        // ---
        let phone = MemoryTransport::new();
        let companion = phone.clone();
        let reading = Reading::new(8.1, GlycemiaUnit::MmolL, 42).unwrap();

        assert!(companion.fetch_latest().await.is_none());
        assert!(phone.has_push_target());
        assert!(phone.send(&reading).await);
        assert_eq!(companion.fetch_latest().await, Some(reading));
        assert_eq!(phone.delivered(), 1);

        phone.set_offline(true);
        assert!(!phone.send(&reading).await);
        assert!(companion.fetch_latest().await.is_none());
        assert_eq!(phone.delivered(), 1);
    }
}
