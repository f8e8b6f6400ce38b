pub mod credentials;
pub mod memory;
pub mod migrations;
pub mod persisted;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use credentials::Credentials;
pub use memory::MemoryStore;
pub use persisted::PersistedMap;

/// Namespace holding login material.
pub const SECURE_NAMESPACE: &str = "secure";

/// String key-value storage, partitioned into namespaces.
///
/// Implementations are blocking; callers on the async runtime keep the
/// values small (usernames, keys, cached URLs).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
    fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Every entry in a namespace, used to warm in-memory state on startup.
    fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>>;

    /// Atomically replaces a namespace with `entries`.
    fn replace_all(&self, namespace: &str, entries: &[(String, String)]) -> Result<()>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
        f(&mut conn)
    }
}
