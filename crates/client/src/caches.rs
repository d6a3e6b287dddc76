//! Process-wide shared state: tracking id, DNS results, signing keys.
//!
//! One instance is built per process and injected into every session.
//! Refreshes run under a mutex held across the fetch, so concurrent
//! sessions wait for the in-flight refresh and reuse its result instead
//! of issuing duplicates.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use blive_api::WbiSigner;

use crate::error::ClientError;

/// How long a fetched tracking id stays fresh.
pub const TRACKING_ID_TTL: Duration = Duration::from_secs(60);

/// How long resolved addresses stay cached.
pub const DNS_TTL: Duration = Duration::from_secs(10 * 60);

struct TrackingId {
    value: String,
    refreshed_at: Instant,
}

struct DnsEntry {
    addrs: Vec<IpAddr>,
    resolved_at: Instant,
}

/// Shared caches and HTTP machinery for all sessions in the process.
pub struct SharedCaches {
    http: reqwest::Client,
    signer: WbiSigner,
    tracking: Mutex<Option<TrackingId>>,
    dns: Mutex<HashMap<String, DnsEntry>>,
}

impl SharedCaches {
    pub fn new() -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(blive_api::ApiError::Http)?;
        Ok(Self {
            signer: WbiSigner::new(http.clone()),
            http,
            tracking: Mutex::new(None),
            dns: Mutex::new(HashMap::new()),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn signer(&self) -> &WbiSigner {
        &self.signer
    }

    /// The current tracking id, refreshed if stale.
    ///
    /// A failed refresh is logged and the previous value (if any) is kept;
    /// the join handshake works without one.
    pub async fn tracking_id(&self) -> Option<String> {
        let mut guard = self.tracking.lock().await;
        let fresh = guard
            .as_ref()
            .is_some_and(|t| t.refreshed_at.elapsed() < TRACKING_ID_TTL);
        if !fresh {
            match blive_api::fetch_buvid(&self.http).await {
                Ok(value) => {
                    *guard = Some(TrackingId {
                        value,
                        refreshed_at: Instant::now(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "tracking id refresh failed");
                }
            }
        }
        guard.as_ref().map(|t| t.value.clone())
    }

    /// Seeds the tracking id without a network call.
    pub async fn prime_tracking_id(&self, value: impl Into<String>) {
        *self.tracking.lock().await = Some(TrackingId {
            value: value.into(),
            refreshed_at: Instant::now(),
        });
    }

    /// Resolves `host`, serving repeat lookups from the cache.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, std::io::Error> {
        let mut guard = self.dns.lock().await;
        if let Some(entry) = guard.get(host) {
            if entry.resolved_at.elapsed() < DNS_TTL {
                return Ok(entry.addrs.clone());
            }
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
            .await?
            .map(|sa| sa.ip())
            .collect();
        debug!(host, count = addrs.len(), "resolved chat host");
        guard.insert(
            host.to_string(),
            DnsEntry {
                addrs: addrs.clone(),
                resolved_at: Instant::now(),
            },
        );
        Ok(addrs)
    }
}
