//! Hostname → backend cache in front of a discovery provider.
//!
//! Entries are either a resolved record or a lookup still in flight. A
//! pending lookup is a shared future: every caller that misses on the same
//! hostname while it runs awaits the same future and sees the same outcome,
//! so the provider is asked once. The future records its own result, so the
//! cache is updated even if the request that started it went away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::RwLock;

use crate::discovery::provider::ServiceDiscoveryProvider;
use crate::discovery::record::{BackendAddr, ServiceRecord, normalize_host, service_name};
use crate::error::ProxyError;

type Lookup = Shared<BoxFuture<'static, Option<ServiceRecord>>>;

enum Slot {
    Ready(ServiceRecord),
    Pending { generation: u64, lookup: Lookup },
}

struct Inner {
    provider: Arc<dyn ServiceDiscoveryProvider>,
    ttl: Duration,
    timeout: Duration,
    entries: RwLock<HashMap<String, Slot>>,
    next_generation: AtomicU64,
}

/// Shared, cheaply cloneable discovery cache.
#[derive(Clone)]
pub struct DiscoveryCache {
    inner: Arc<Inner>,
}

impl DiscoveryCache {
    /// `ttl` bounds how long a record is served without asking the provider
    /// again; `timeout` bounds each provider call.
    pub fn new(provider: Arc<dyn ServiceDiscoveryProvider>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                ttl,
                timeout,
                entries: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Resolves a `Host` header value to a backend.
    ///
    /// Port suffix and case are ignored. Misses are never cached.
    pub async fn resolve(&self, host: &str) -> Result<ServiceRecord, ProxyError> {
        let hostname = normalize_host(host);
        if hostname.is_empty() {
            return Err(ProxyError::DiscoveryMiss(host.to_string()));
        }

        let pending = {
            let entries = self.inner.entries.read().await;
            match entries.get(&hostname) {
                Some(Slot::Ready(record)) if record.is_fresh(self.inner.ttl) => {
                    tracing::debug!(host = %hostname, backend = %record.backend, "Discovery cache hit");
                    return Ok(record.clone());
                }
                Some(Slot::Pending { lookup, .. }) => Some(lookup.clone()),
                _ => None,
            }
        };

        let lookup = match pending {
            Some(lookup) => {
                tracing::debug!(host = %hostname, "Joining in-flight discovery");
                lookup
            }
            None => self.begin_lookup(&hostname).await,
        };

        lookup.await.ok_or(ProxyError::DiscoveryMiss(hostname))
    }

    /// Forgets any cached record for `host`. An in-flight lookup still
    /// answers its waiters but its result is not stored.
    pub async fn invalidate(&self, host: &str) -> bool {
        let hostname = normalize_host(host);
        let removed = self.inner.entries.write().await.remove(&hostname).is_some();
        if removed {
            tracing::debug!(host = %hostname, "Discovery cache entry invalidated");
        }
        removed
    }

    /// Number of hostnames with a record or a lookup in flight.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn begin_lookup(&self, hostname: &str) -> Lookup {
        let mut entries = self.inner.entries.write().await;

        // Someone may have got here first while we waited for the write lock
        match entries.get(hostname) {
            Some(Slot::Ready(record)) if record.is_fresh(self.inner.ttl) => {
                return future::ready(Some(record.clone())).boxed().shared();
            }
            Some(Slot::Pending { lookup, .. }) => return lookup.clone(),
            _ => {}
        }

        tracing::debug!(host = %hostname, "Discovery cache miss");

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let lookup = run_lookup(
            Arc::downgrade(&self.inner),
            self.inner.provider.clone(),
            self.inner.timeout,
            hostname.to_string(),
            generation,
        )
        .boxed()
        .shared();

        entries.insert(
            hostname.to_string(),
            Slot::Pending {
                generation,
                lookup: lookup.clone(),
            },
        );

        lookup
    }
}

async fn run_lookup(
    cache: Weak<Inner>,
    provider: Arc<dyn ServiceDiscoveryProvider>,
    timeout: Duration,
    hostname: String,
    generation: u64,
) -> Option<ServiceRecord> {
    let service = service_name(&hostname);

    let outcome = match tokio::time::timeout(timeout, provider.lookup(service)).await {
        Ok(Ok(Some(found))) => {
            let record = ServiceRecord::new(
                hostname.clone(),
                BackendAddr::new(found.address, found.port),
                found.capabilities,
            );
            tracing::info!(host = %hostname, backend = %record.backend, "Service discovered");
            Some(record)
        }
        Ok(Ok(None)) => {
            tracing::info!(host = %hostname, service = %service, "No service discovered");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(host = %hostname, service = %service, error = %e, "Discovery failed");
            None
        }
        Err(_) => {
            tracing::warn!(host = %hostname, service = %service, timeout_ms = timeout.as_millis() as u64, "Discovery timed out");
            None
        }
    };

    if let Some(inner) = cache.upgrade() {
        let mut entries = inner.entries.write().await;
        let still_current = matches!(
            entries.get(&hostname),
            Some(Slot::Pending { generation: g, .. }) if *g == generation
        );

        if still_current {
            match &outcome {
                Some(record) => {
                    entries.insert(hostname.clone(), Slot::Ready(record.clone()));
                }
                None => {
                    entries.remove(&hostname);
                }
            }
        }
    }

    outcome
}
