use crate::{KeyValueStore, SqliteStore};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_value(conn, namespace, key))
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace, key)
                 DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                (namespace, key, value),
            )?;
            Ok(())
        })
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                (namespace, key),
            )?;
            Ok(())
        })
    }

    fn load_all(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM kv WHERE namespace = ?1 ORDER BY key")?;
            let rows = stmt
                .query_map([namespace], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn replace_all(&self, namespace: &str, entries: &[(String, String)]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM kv WHERE namespace = ?1", [namespace])?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)")?;
                for (key, value) in entries {
                    stmt.execute((namespace, key, value))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }
}

fn query_value(conn: &Connection, namespace: &str, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
            (namespace, key),
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}
