//! In-memory query cache.
//!
//! Entries are keyed by `(resource, serialized params)`. Reading an entry
//! returns whatever is cached right away and, when the freshness policy says
//! so, starts a background fetch that writes back into the same entry. Data
//! already on screen stays there while a revalidation runs.

use crate::error::ApiError;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: &'static str,
    params: String,
}

impl QueryKey {
    pub fn new(resource: &'static str, params: &[(&'static str, String)]) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        QueryKey { resource, params }
    }

    pub fn simple(resource: &'static str) -> Self {
        QueryKey {
            resource,
            params: String::new(),
        }
    }

    /// `"dashboard"` matches `"dashboard"` and `"dashboard/summary"`, not `"dashboards"`.
    pub fn in_group(&self, group: &str) -> bool {
        self.resource == group
            || (self.resource.starts_with(group)
                && self.resource[group.len()..].starts_with('/'))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryPolicy {
    /// A mount read within this window is served from cache without a fetch.
    pub stale_time: Duration,
    /// Background polling period while the query is on screen.
    pub refetch_interval: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The view showing this key just appeared or its key changed.
    Mount,
    /// Periodic re-read while the view stays on screen.
    Tick,
    /// Operator asked for fresh data.
    Refresh,
}

#[derive(Default)]
struct Entry {
    data: Option<Arc<dyn Any + Send + Sync>>,
    error: Option<String>,
    updated_at: Option<Instant>,
    last_observed: Option<Instant>,
    in_flight: bool,
    invalidated: bool,
    generation: u64,
}

impl Entry {
    fn should_fetch(&self, policy: &QueryPolicy, trigger: Trigger, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        if self.invalidated {
            return true;
        }
        let Some(updated_at) = self.updated_at else {
            return true;
        };
        let age = now.saturating_duration_since(updated_at);
        match trigger {
            Trigger::Refresh => true,
            Trigger::Mount => age >= policy.stale_time,
            Trigger::Tick => policy
                .refetch_interval
                .map_or(false, |interval| age >= interval),
        }
    }
}

/// What a view sees when it reads a key.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<String>,
    pub is_fetching: bool,
}

impl<T> QuerySnapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        QuerySnapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
        }
    }
}

impl<T> Default for QuerySnapshot<T> {
    fn default() -> Self {
        QuerySnapshot {
            data: None,
            error: None,
            is_fetching: false,
        }
    }
}

#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        QueryCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            version: Arc::new(version),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bumped every time a fetch settles or entries are invalidated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Returns the cached state for `key`, spawning `fetch` on the runtime if
    /// the policy calls for it and no request for the key is already running.
    pub fn observe<T, F, Fut>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        trigger: Trigger,
        now: Instant,
        fetch: F,
    ) -> QuerySnapshot<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.last_observed = Some(now);

        if entry.should_fetch(policy, trigger, now) {
            entry.in_flight = true;
            let generation = entry.generation;
            tracing::debug!(resource = key.resource, params = %key.params, ?trigger, "fetch started");

            let cache = self.clone();
            let key = key.clone();
            let request = fetch();
            tokio::spawn(async move {
                let result = request.await;
                cache.settle(&key, generation, result);
            });
        }

        snapshot(entry)
    }

    fn settle<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        generation: u64,
        result: Result<T, ApiError>,
    ) {
        {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_default();
            entry.in_flight = false;
            entry.updated_at = Some(Instant::now());
            match result {
                Ok(value) => {
                    entry.data = Some(Arc::new(value));
                    entry.error = None;
                    // An invalidation that landed mid-flight still needs a fresh read.
                    if entry.generation == generation {
                        entry.invalidated = false;
                    }
                    tracing::debug!(resource = key.resource, params = %key.params, "fetch settled");
                }
                Err(err) => {
                    tracing::warn!(resource = key.resource, params = %key.params, error = %err, "fetch failed");
                    entry.error = Some(err.to_string());
                    if entry.generation == generation {
                        entry.invalidated = false;
                    }
                }
            }
        }
        self.bump();
    }

    /// Marks every entry in `group` stale so its next read refetches.
    pub fn invalidate_group(&self, group: &str) -> usize {
        let count = {
            let mut entries = self.lock();
            let mut count = 0;
            for (key, entry) in entries.iter_mut() {
                if key.in_group(group) {
                    entry.invalidated = true;
                    entry.generation += 1;
                    count += 1;
                }
            }
            count
        };
        tracing::info!(group, count, "invalidated cached queries");
        self.bump();
        count
    }

    /// Drops entries nobody has read for `idle`, unless a fetch is running.
    pub fn evict_idle(&self, idle: Duration, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.in_flight
                || entry
                    .last_observed
                    .map_or(false, |seen| now.saturating_duration_since(seen) < idle)
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

fn snapshot<T: Send + Sync + 'static>(entry: &Entry) -> QuerySnapshot<T> {
    QuerySnapshot {
        data: entry
            .data
            .clone()
            .and_then(|data| data.downcast::<T>().ok()),
        error: entry.error.clone(),
        is_fetching: entry.in_flight,
    }
}
