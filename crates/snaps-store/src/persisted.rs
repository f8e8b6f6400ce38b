use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::KeyValueStore;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// In-memory string map mirrored to a store namespace.
///
/// Loaded once on construction; every change schedules a write after
/// `debounce`, and a burst of changes inside that window collapses into a
/// single write of the latest contents. A bounded map drops its least
/// recently set keys once it grows past `max_entries`.
#[derive(Clone)]
pub struct PersistedMap {
    inner: Arc<PersistedInner>,
}

struct PersistedInner {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    entries: Mutex<Entries>,
    revision: AtomicU64,
    debounce: Duration,
}

/// Values plus key recency, oldest first.
struct Entries {
    values: HashMap<String, String>,
    order: VecDeque<String>,
    max_entries: Option<usize>,
}

impl Entries {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    /// Drops the oldest keys beyond the bound. Returns how many went.
    fn trim(&mut self) -> usize {
        let Some(max) = self.max_entries else {
            return 0;
        };
        let mut dropped = 0;
        while self.values.len() > max {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.values.remove(&oldest).is_some() {
                dropped += 1;
            }
        }
        dropped
    }
}

impl PersistedMap {
    pub fn load(store: Arc<dyn KeyValueStore>, namespace: &str, debounce: Duration) -> Result<Self> {
        Self::open(store, namespace, debounce, None)
    }

    /// Like [`load`](Self::load), keeping at most `max_entries` keys.
    pub fn load_bounded(
        store: Arc<dyn KeyValueStore>,
        namespace: &str,
        debounce: Duration,
        max_entries: usize,
    ) -> Result<Self> {
        Self::open(store, namespace, debounce, Some(max_entries))
    }

    fn open(
        store: Arc<dyn KeyValueStore>,
        namespace: &str,
        debounce: Duration,
        max_entries: Option<usize>,
    ) -> Result<Self> {
        let loaded = store.load_all(namespace)?;
        let mut entries = Entries {
            order: loaded.iter().map(|(k, _)| k.clone()).collect(),
            values: loaded.into_iter().collect(),
            max_entries,
        };
        let dropped = entries.trim();
        debug!("Loaded {} entries from '{}'", entries.values.len(), namespace);

        let map = Self {
            inner: Arc::new(PersistedInner {
                store,
                namespace: namespace.to_string(),
                entries: Mutex::new(entries),
                revision: AtomicU64::new(0),
                debounce,
            }),
        };
        if dropped > 0 {
            debug!("Dropped {} entries over the bound of '{}'", dropped, namespace);
            map.schedule_save();
        }
        Ok(map)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().values.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&self, key: &str, value: &str) {
        let changed = {
            let mut entries = self.inner.lock();
            entries.touch(key);
            let changed = entries.values.insert(key.to_string(), value.to_string()).as_deref() != Some(value);
            entries.trim() > 0 || changed
        };
        if changed {
            self.schedule_save();
        }
    }

    pub fn remove(&self, key: &str) {
        let removed = {
            let mut entries = self.inner.lock();
            entries.order.retain(|k| k != key);
            entries.values.remove(key).is_some()
        };
        if removed {
            self.schedule_save();
        }
    }

    /// Writes the current contents immediately.
    pub fn flush(&self) -> Result<()> {
        self.inner.revision.fetch_add(1, Ordering::SeqCst);
        self.inner.write()
    }

    fn schedule_save(&self) {
        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime to debounce on: save now.
            if let Err(e) = self.inner.write() {
                warn!("Saving '{}' failed: {}", self.inner.namespace, e);
            }
            return;
        };

        let inner = self.inner.clone();
        handle.spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            // A later change owns the save.
            if inner.revision.load(Ordering::SeqCst) != revision {
                return;
            }
            if let Err(e) = inner.write() {
                warn!("Saving '{}' failed: {}", inner.namespace, e);
            }
        });
    }
}

impl PersistedInner {
    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A poisoned map still holds valid strings.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> Result<()> {
        let snapshot: Vec<(String, String)> = self
            .lock()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.store.replace_all(&self.namespace, &snapshot)?;
        debug!("Saved {} entries to '{}'", snapshot.len(), self.namespace);
        Ok(())
    }
}
