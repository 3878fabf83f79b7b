//! Cache entries.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::query::error::{FetchError, QueryError};

pub(crate) type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, FetchError>> + Send + Sync>;

/// Handle on the single in-flight fetch of an entry.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Value, QueryError>>>;

/// Observable state of one cached query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Last successful result. Survives later failures.
    pub data: Option<Value>,
    /// Terminal failure of the most recent fetch, cleared on success.
    pub error: Option<QueryError>,
    pub fetching: bool,
    pub fetched_at: Option<Instant>,
    /// Retries spent by the current (or last) fetch.
    pub retry_count: u32,
}

pub(crate) struct CacheEntry {
    pub data: Option<Value>,
    pub fetched_at: Option<Instant>,
    pub stale_after: Duration,
    pub error: Option<QueryError>,
    pub retry_count: u32,
    pub fetcher: Fetcher,
    pub in_flight: Option<SharedFetch>,
    /// Invalidated while `in_flight` was running; its result lands stale.
    pub invalidated: bool,
    pub last_access: Instant,
    updates: watch::Sender<QueryState>,
}

impl CacheEntry {
    pub fn new(fetcher: Fetcher, stale_after: Duration) -> Self {
        let (updates, _) = watch::channel(QueryState::default());
        Self {
            data: None,
            fetched_at: None,
            stale_after,
            error: None,
            retry_count: 0,
            fetcher,
            in_flight: None,
            invalidated: false,
            last_access: Instant::now(),
            updates,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.fetched_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.stale_after)
    }

    pub fn subscribers(&self) -> usize {
        self.updates.receiver_count()
    }

    /// Safe to drop: nothing in flight and nobody watching.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.subscribers() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.updates.subscribe()
    }

    pub fn state(&self) -> QueryState {
        QueryState {
            data: self.data.clone(),
            error: self.error.clone(),
            fetching: self.in_flight.is_some(),
            fetched_at: self.fetched_at,
            retry_count: self.retry_count,
        }
    }

    pub fn publish(&self) {
        self.updates.send_replace(self.state());
    }

    /// Record the outcome of the in-flight fetch.
    ///
    /// Returns whether the entry was invalidated while that fetch ran.
    pub fn complete(&mut self, result: &Result<Value, QueryError>) -> bool {
        let invalidated = std::mem::take(&mut self.invalidated);
        match result {
            Ok(data) => {
                self.data = Some(data.clone());
                self.fetched_at = (!invalidated).then(Instant::now);
                self.error = None;
                self.retry_count = 0;
            }
            Err(e) => self.error = Some(e.clone()),
        }
        self.in_flight = None;
        self.publish();
        invalidated
    }
}
