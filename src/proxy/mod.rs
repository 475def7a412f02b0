//! The proxy service: cache lookup, batch execution, and revalidation.
//!
//! Per request:
//!
//! 1. Without cache directives, execute directly.
//! 2. Otherwise fingerprint the normalized request and look it up.
//! 3. On a hit, return the cached envelope. If `stale-while-revalidate` is set
//!    and the entry is older than that, first schedule one background refresh.
//! 4. On a miss, execute, and store the envelope for `max-age` seconds when
//!    it carries no errors.

use std::sync::Arc;

use dashmap::DashSet;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::background::spawn_detached;
use crate::cache::{CacheDirectives, CacheStore, Fingerprint};
use crate::executor::{BatchExecutor, QueryExecutor};
use crate::query::ProxyRequest;
use crate::response::{ResponseEnvelope, assemble};

pub mod endpoint;

/// Envelopes are shared between the cache and in-flight responses.
pub type SharedEnvelope = Arc<ResponseEnvelope>;

/// The response cache used by [`ProxyService`].
pub type ResponseCache = CacheStore<SharedEnvelope>;

#[derive(Debug, Error)]
enum RevalidationError {
    #[error("refreshed response for {0} carried errors; keeping the cached entry")]
    ErrorResponse(Fingerprint),
}

/// Orchestrates caching and execution for incoming requests.
///
/// Cheap to clone; clones share the same cache and executor.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dataproxy::cache::CacheStore;
/// use dataproxy::executor::CapabilityTable;
/// use dataproxy::proxy::ProxyService;
///
/// let service = ProxyService::new(Arc::new(CapabilityTable::new()), Arc::new(CacheStore::new()));
/// assert!(service.cache().is_empty());
/// ```
#[derive(Clone)]
pub struct ProxyService {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Arc<ResponseCache>,
    batch: BatchExecutor,
    revalidating: DashSet<Fingerprint>,
}

impl ProxyService {
    /// Creates a service that runs sub-queries on `executor` and caches into `cache`.
    pub fn new(executor: Arc<dyn QueryExecutor>, cache: Arc<ResponseCache>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                batch: BatchExecutor::new(executor),
                revalidating: DashSet::new(),
            }),
        }
    }

    /// The response cache shared by every clone of this service.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.inner.cache
    }

    /// Answers `request`, consulting the cache according to `directives`.
    pub async fn handle(
        &self,
        request: ProxyRequest,
        directives: Option<CacheDirectives>,
    ) -> SharedEnvelope {
        let Some(directives) = directives else {
            return self.execute(&request).await;
        };

        let fingerprint = match Fingerprint::of(&request) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(error = %e, "could not fingerprint request; bypassing cache");
                return self.execute(&request).await;
            }
        };

        if let Some(cached) = self.inner.cache.get_full(fingerprint.as_str()) {
            let age = cached.age(Instant::now());
            debug!(%fingerprint, age_ms = age.as_millis() as u64, "cache hit");
            if directives
                .stale_while_revalidate_duration()
                .is_some_and(|threshold| age > threshold)
            {
                self.revalidate(request, fingerprint, cached.expires_at);
            }
            return cached.value;
        }

        debug!(%fingerprint, "cache miss");
        let envelope = self.execute(&request).await;
        if let Some(ttl) = directives.max_age_duration() {
            if envelope.has_errors() {
                debug!(%fingerprint, "not caching a response that carries errors");
            } else {
                self.inner
                    .cache
                    .set(fingerprint.as_str(), Arc::clone(&envelope), ttl);
            }
        }
        envelope
    }

    async fn execute(&self, request: &ProxyRequest) -> SharedEnvelope {
        let results = self
            .inner
            .batch
            .execute_batch(request.sub_queries().to_vec())
            .await;
        Arc::new(assemble(request, results))
    }

    // At most one refresh per fingerprint is in flight at a time.
    fn revalidate(&self, request: ProxyRequest, fingerprint: Fingerprint, expires_at: Instant) {
        if !self.inner.revalidating.insert(fingerprint.clone()) {
            debug!(%fingerprint, "revalidation already in flight");
            return;
        }
        debug!(%fingerprint, "scheduling revalidation");

        let service = self.clone();
        spawn_detached("cache revalidation", async move {
            let _in_flight = InFlight {
                set: &service.inner.revalidating,
                key: fingerprint.clone(),
            };

            let envelope = service.execute(&request).await;
            if envelope.has_errors() {
                return Err(RevalidationError::ErrorResponse(fingerprint));
            }

            // The refreshed value inherits the old entry's expiry.
            let ttl = expires_at.saturating_duration_since(Instant::now());
            if ttl.is_zero() {
                debug!(%fingerprint, "entry expired while revalidating");
                return Ok(());
            }
            service.inner.cache.set(fingerprint.as_str(), envelope, ttl);
            debug!(%fingerprint, ttl_ms = ttl.as_millis() as u64, "revalidated cache entry");
            Ok(())
        });
    }
}

// Clears the in-flight marker even if the refresh panics.
struct InFlight<'a> {
    set: &'a DashSet<Fingerprint>,
    key: Fingerprint,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}
