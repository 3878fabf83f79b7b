//! Query client: cache, coalescing, retries, failure reporting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::QueryConfig;
use crate::notify::{NotificationKind, Notifier, NOT_MODIFIED_MESSAGE};
use crate::observability::metrics;
use crate::query::cache::{CacheEntry, Fetcher, QueryState, SharedFetch};
use crate::query::error::{FetchError, QueryError};
use crate::query::fingerprint::Fingerprint;
use crate::resilience::{OperationKind, RetryPolicy};

/// Shared handle; clones use the same cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

struct Inner {
    entries: DashMap<Fingerprint, CacheEntry>,
    policy: RetryPolicy,
    notifier: Arc<dyn Notifier>,
    default_stale_time: Duration,
    max_entries: usize,
}

enum ReadPlan {
    Cached(Value),
    Wait(SharedFetch),
}

impl QueryClient {
    pub fn new(config: &QueryConfig, policy: RetryPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                policy,
                notifier,
                default_stale_time: Duration::from_millis(config.stale_time_ms),
                max_entries: config.max_entries.max(1),
            }),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub fn default_stale_time(&self) -> Duration {
        self.inner.default_stale_time
    }

    /// Read through the cache.
    ///
    /// Fresh data is returned without a fetch. Stale data is returned
    /// immediately while one background refresh runs. Without data the
    /// caller waits on the (shared) fetch.
    pub async fn read<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        fetcher: F,
        stale_time: Duration,
    ) -> Result<Value, QueryError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || fetcher().boxed());
        let now = Instant::now();

        let plan = {
            let mut entry = self
                .inner
                .entries
                .entry(fingerprint.clone())
                .or_insert_with(|| CacheEntry::new(fetcher.clone(), stale_time));
            entry.fetcher = fetcher;
            entry.stale_after = stale_time;
            entry.last_access = now;

            match entry.data.clone() {
                Some(data) if entry.is_fresh(now) => {
                    tracing::trace!(query = %fingerprint, "Serving fresh cache entry");
                    ReadPlan::Cached(data)
                }
                Some(data) => {
                    tracing::debug!(query = %fingerprint, "Serving stale entry, revalidating");
                    self.inner.ensure_fetch(&fingerprint, entry.value_mut());
                    ReadPlan::Cached(data)
                }
                None => ReadPlan::Wait(self.inner.ensure_fetch(&fingerprint, entry.value_mut())),
            }
        };
        self.inner.evict_over_capacity();

        match plan {
            ReadPlan::Cached(data) => Ok(data),
            ReadPlan::Wait(fetch) => fetch.await,
        }
    }

    /// Run a write. Not cached, never coalesced.
    ///
    /// A terminal failure is reported once through the notifier (plus the
    /// not-modified notice for a 304), then `on_error` runs, then the error
    /// is returned.
    pub async fn mutate<F, Fut, E>(&self, fetcher: F, on_error: E) -> Result<Value, QueryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
        E: FnOnce(&QueryError),
    {
        match self.inner.execute(OperationKind::Mutation, None, fetcher).await {
            Ok(value) => Ok(value),
            Err(error) => {
                let description = format!(
                    "Mutation failed ({:?}, {} attempt(s)): {}",
                    error.class(),
                    error.attempts(),
                    error.fetch_error()
                );
                self.inner.notifier.report(NotificationKind::ServerError, &description);
                if error.fetch_error().is_not_modified() {
                    self.inner.notifier.report(NotificationKind::NotModified, NOT_MODIFIED_MESSAGE);
                }
                on_error(&error);
                Err(error)
            }
        }
    }

    /// Follow a cached query. `None` until the fingerprint has been read once.
    pub fn subscribe(&self, fingerprint: &Fingerprint) -> Option<watch::Receiver<QueryState>> {
        self.inner.entries.get(fingerprint).map(|entry| entry.subscribe())
    }

    pub fn cached(&self, fingerprint: &Fingerprint) -> Option<QueryState> {
        self.inner.entries.get(fingerprint).map(|entry| entry.state())
    }

    /// Drop a cached query.
    ///
    /// Entries that are being fetched or watched are kept but marked stale;
    /// watched ones are refetched right away. A fetch already running when
    /// the entry is invalidated cannot make it fresh again.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        if self
            .inner
            .entries
            .remove_if(fingerprint, |_, entry| entry.is_idle())
            .is_some()
        {
            tracing::debug!(query = %fingerprint, "Cache entry invalidated");
            metrics::record_cache_size(self.inner.entries.len());
            return true;
        }

        let Some(mut entry) = self.inner.entries.get_mut(fingerprint) else {
            return false;
        };
        entry.fetched_at = None;
        entry.invalidated = entry.in_flight.is_some();
        if entry.subscribers() > 0 && entry.in_flight.is_none() {
            tracing::debug!(query = %fingerprint, "Invalidated watched entry, refetching");
            self.inner.ensure_fetch(fingerprint, entry.value_mut());
        }
        true
    }

    /// Refetch stale, watched entries. Production only.
    ///
    /// Returns how many fetches were started.
    pub fn refetch_on_focus(&self) -> usize {
        if !self.inner.policy.environment().is_production() {
            return 0;
        }

        let now = Instant::now();
        let mut started = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if entry.subscribers() == 0 || entry.in_flight.is_some() || entry.is_fresh(now) {
                continue;
            }
            let fingerprint = entry.key().clone();
            self.inner.ensure_fetch(&fingerprint, entry.value_mut());
            started += 1;
        }
        if started > 0 {
            tracing::debug!(started, "Focus refetch");
        }
        started
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl Inner {
    /// Join the entry's in-flight fetch or start one.
    ///
    /// The fetch is a spawned task; dropping every waiter does not cancel it.
    fn ensure_fetch(self: &Arc<Self>, fingerprint: &Fingerprint, entry: &mut CacheEntry) -> SharedFetch {
        if let Some(fetch) = &entry.in_flight {
            tracing::trace!(query = %fingerprint, "Joining in-flight fetch");
            return fetch.clone();
        }

        let inner = Arc::clone(self);
        let key = fingerprint.clone();
        let fetcher = entry.fetcher.clone();
        let task = tokio::spawn(async move {
            let result = inner
                .execute(OperationKind::Read, Some(&key), || fetcher())
                .await;
            if let Some(mut entry) = inner.entries.get_mut(&key) {
                if entry.complete(&result) && entry.subscribers() > 0 {
                    tracing::debug!(query = %key, "Invalidated during fetch, refetching");
                    inner.ensure_fetch(&key, entry.value_mut());
                }
            }
            result
        });

        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(QueryError::from_attempt(
                    FetchError::Network(format!("fetch task failed: {}", e)),
                    1,
                )),
            }
        }
        .boxed()
        .shared();

        entry.retry_count = 0;
        entry.invalidated = false;
        entry.in_flight = Some(fetch.clone());
        entry.publish();
        fetch
    }

    async fn execute<F, Fut>(
        &self,
        kind: OperationKind,
        fingerprint: Option<&Fingerprint>,
        fetcher: F,
    ) -> Result<Value, QueryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        let mut retries = 0;
        loop {
            let error = match fetcher().await {
                Ok(value) => {
                    metrics::record_fetch(kind.as_str(), "success");
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = error.classify();
            if !self.policy.should_retry(class, kind, retries) {
                metrics::record_fetch(kind.as_str(), "failure");
                tracing::warn!(
                    kind = %kind,
                    class = ?class,
                    attempts = retries + 1,
                    error = %error,
                    "Request failed"
                );
                return Err(QueryError::from_attempt(error, retries + 1));
            }

            retries += 1;
            metrics::record_retry(kind.as_str());
            if let Some(mut entry) = fingerprint.and_then(|key| self.entries.get_mut(key)) {
                entry.retry_count = retries;
                entry.publish();
            }

            let delay = self.policy.backoff(retries);
            tracing::debug!(
                kind = %kind,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Drop least-recently-used idle entries beyond capacity.
    fn evict_over_capacity(&self) {
        while self.entries.len() > self.max_entries {
            let victim = self
                .entries
                .iter()
                .filter(|entry| entry.is_idle())
                .min_by_key(|entry| entry.last_access)
                .map(|entry| entry.key().clone());

            let Some(victim) = victim else {
                break;
            };
            if self.entries.remove_if(&victim, |_, entry| entry.is_idle()).is_some() {
                tracing::trace!(query = %victim, "Evicted cache entry");
            }
        }
        metrics::record_cache_size(self.entries.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, RetryConfig};
    use crate::notify::ChannelNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(environment: Environment, max_entries: usize) -> QueryClient {
        let config = QueryConfig {
            max_entries,
            ..QueryConfig::default()
        };
        let policy = RetryPolicy::for_environment(environment, &config.retry);
        let (notifier, _rx) = ChannelNotifier::new();
        QueryClient::new(&config, policy, Arc::new(notifier))
    }

    fn counting(calls: &Arc<AtomicUsize>) -> impl Fn() -> futures_util::future::Ready<Result<Value, FetchError>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(Value::from(n as u64)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_skips_recent() {
        let client = client(Environment::Development, 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let stale = Duration::from_secs(60);

        let a = Fingerprint::new("a", &());
        let b = Fingerprint::new("b", &());
        let c = Fingerprint::new("c", &());

        client.read(a.clone(), counting(&calls), stale).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        client.read(b.clone(), counting(&calls), stale).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        client.read(a.clone(), counting(&calls), stale).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        client.read(c.clone(), counting(&calls), stale).await.unwrap();

        assert_eq!(client.len(), 2);
        assert!(client.cached(&a).is_some());
        assert!(client.cached(&b).is_none());
        assert!(client.cached(&c).is_some());
    }

    #[tokio::test]
    async fn test_invalidate_idle_entry() {
        let client = client(Environment::Development, 16);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Fingerprint::new("certificates", &());

        client.read(key.clone(), counting(&calls), Duration::from_secs(60)).await.unwrap();
        assert!(client.invalidate(&key));
        assert!(client.cached(&key).is_none());
        assert!(!client.invalidate(&key));

        client.read(key, counting(&calls), Duration::from_secs(60)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_focus_refetch_is_noop_in_development() {
        let client = client(Environment::Development, 16);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Fingerprint::new("certificates", &());

        client.read(key.clone(), counting(&calls), Duration::ZERO).await.unwrap();
        let _watch = client.subscribe(&key).unwrap();
        assert_eq!(client.refetch_on_focus(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
