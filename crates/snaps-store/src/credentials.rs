use std::fmt;

use anyhow::Result;

use crate::{KeyValueStore, SECURE_NAMESPACE};

const USERNAME_KEY: &str = "username";
const POSTING_KEY: &str = "posting_key";

/// Locally stored login. The posting key is only handed to the signing
/// library; nothing in this workspace reads it beyond load/save.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub posting_key: String,
}

impl Credentials {
    /// Returns `None` unless both halves are present.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>> {
        let username = store.get(SECURE_NAMESPACE, USERNAME_KEY)?;
        let posting_key = store.get(SECURE_NAMESPACE, POSTING_KEY)?;
        Ok(match (username, posting_key) {
            (Some(username), Some(posting_key)) if !username.is_empty() => Some(Self {
                username,
                posting_key,
            }),
            _ => None,
        })
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(SECURE_NAMESPACE, USERNAME_KEY, &self.username)?;
        store.set(SECURE_NAMESPACE, POSTING_KEY, &self.posting_key)?;
        Ok(())
    }

    pub fn clear(store: &dyn KeyValueStore) -> Result<()> {
        store.delete(SECURE_NAMESPACE, POSTING_KEY)?;
        store.delete(SECURE_NAMESPACE, USERNAME_KEY)?;
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("posting_key", &"<redacted>")
            .finish()
    }
}
