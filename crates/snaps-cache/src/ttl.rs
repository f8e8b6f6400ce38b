use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared, join_all};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Loads the value for one key.
#[async_trait]
pub trait Fetch<K, V>: Send + Sync + 'static {
    /// `Ok(None)` means "nothing there"; it is cached like a failure.
    async fn fetch(&self, key: &K) -> anyhow::Result<Option<V>>;

    /// Keys rejected here are skipped by [`TtlCache::preload`].
    fn is_valid_key(&self, _key: &K) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long a fetched value stays fresh.
    pub success_ttl: Duration,
    /// How long a failed or empty fetch is remembered before retrying.
    pub failure_ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            success_ttl: Duration::from_secs(30 * 60),
            failure_ttl: Duration::from_secs(5 * 60),
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    fn ttl_for<V>(&self, entry: &Entry<V>) -> Duration {
        if entry.value.is_some() {
            self.success_ttl
        } else {
            self.failure_ttl
        }
    }

    fn is_fresh<V>(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl_for(entry)
    }
}

/// A fresh cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached<V> {
    Hit(V),
    /// The last fetch failed or found nothing.
    Negative,
}

struct Entry<V> {
    value: Option<V>,
    stored_at: Instant,
}

type InFlight<V> = Shared<BoxFuture<'static, Option<V>>>;

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    in_flight: HashMap<K, InFlight<V>>,
}

/// TTL cache that runs at most one fetch per key at a time.
///
/// Concurrent `get_or_fetch` calls for a key share a single fetch. The fetch
/// stores its own result, so it completes even if the caller that started
/// it goes away and a later caller picks the shared future up.
pub struct TtlCache<K, V, F> {
    config: CacheConfig,
    fetcher: Arc<F>,
    state: Arc<Mutex<State<K, V>>>,
}

impl<K, V, F> Clone for TtlCache<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            fetcher: self.fetcher.clone(),
            state: self.state.clone(),
        }
    }
}

fn lock<K, V>(state: &Mutex<State<K, V>>) -> MutexGuard<'_, State<K, V>> {
    // Entries are plain data; a panic elsewhere cannot leave them half-written.
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl<K, V, F> TtlCache<K, V, F>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fetch<K, V>,
{
    pub fn new(config: CacheConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fresh entry for `key`, without fetching.
    pub fn get(&self, key: &K) -> Option<Cached<V>> {
        let state = lock(&self.state);
        let entry = state.entries.get(key)?;
        if !self.config.is_fresh(entry, Instant::now()) {
            return None;
        }
        Some(match &entry.value {
            Some(v) => Cached::Hit(v.clone()),
            None => Cached::Negative,
        })
    }

    /// Stores a value as if it had just been fetched.
    pub fn insert(&self, key: K, value: Option<V>) {
        lock(&self.state).entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        lock(&self.state).entries.remove(key);
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh value, the result of an in-flight fetch, or a new fetch.
    /// `None` when the fetch failed or found nothing.
    pub async fn get_or_fetch(&self, key: K) -> Option<V> {
        let pending = {
            let mut state = lock(&self.state);
            if let Some(entry) = state.entries.get(&key) {
                if self.config.is_fresh(entry, Instant::now()) {
                    return entry.value.clone();
                }
            }
            match state.in_flight.get(&key) {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.start_fetch(key.clone());
                    state.in_flight.insert(key, pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_fetch(&self, key: K) -> InFlight<V> {
        let fetcher = self.fetcher.clone();
        let state = self.state.clone();

        async move {
            let value = match fetcher.fetch(&key).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Fetch for {:?} failed: {}", key, e);
                    None
                }
            };

            let mut state = lock(&state);
            state.in_flight.remove(&key);
            state.entries.insert(
                key,
                Entry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                },
            );
            value
        }
        .boxed()
        .shared()
    }

    /// Fetches every valid key not already fresh, concurrently. Duplicate
    /// keys are fetched once and failures are only logged.
    /// Returns the number of distinct valid keys.
    pub async fn preload<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<K> = keys
            .into_iter()
            .filter(|k| self.fetcher.is_valid_key(k))
            .filter(|k| seen.insert(k.clone()))
            .collect();
        let count = unique.len();

        join_all(unique.into_iter().map(|k| self.get_or_fetch(k))).await;
        debug!("Preloaded {} keys", count);
        count
    }

    /// Drops stale entries, then the oldest entries beyond `max_entries`.
    /// Returns how many were removed.
    pub fn evict(&self) -> usize {
        let config = self.config;
        let now = Instant::now();
        let mut state = lock(&self.state);
        let before = state.entries.len();

        state.entries.retain(|_, entry| config.is_fresh(entry, now));

        let excess = state.entries.len().saturating_sub(config.max_entries);
        if excess > 0 {
            let mut by_age: Vec<(Instant, K)> = state
                .entries
                .iter()
                .map(|(k, e)| (e.stored_at, k.clone()))
                .collect();
            by_age.sort_by_key(|(stored_at, _)| *stored_at);
            for (_, key) in by_age.into_iter().take(excess) {
                state.entries.remove(&key);
            }
        }

        before - state.entries.len()
    }

    /// Runs [`evict`](Self::evict) every `period` until the handle is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let pruned = cache.evict();
                if pruned > 0 {
                    info!("Cache sweep: pruned {} entries", pruned);
                }
            }
        })
    }
}
