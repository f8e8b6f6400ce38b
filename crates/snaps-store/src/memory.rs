use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::KeyValueStore;

/// In-process store for tests and for running without a database file.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, String), String>>> {
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.lock()?
            .insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.lock()?.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }

    fn replace_all(&self, namespace: &str, entries: &[(String, String)]) -> Result<()> {
        let mut map = self.lock()?;
        map.retain(|(ns, _), _| ns != namespace);
        for (key, value) in entries {
            map.insert((namespace.to_string(), key.clone()), value.clone());
        }
        Ok(())
    }
}
