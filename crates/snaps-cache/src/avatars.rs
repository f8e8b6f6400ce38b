use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use snaps_hive::HiveClient;
use snaps_store::PersistedMap;

use crate::ttl::{CacheConfig, Cached, Fetch, TtlCache};

pub fn fallback_avatar_url(username: &str) -> String {
    format!("https://images.hive.blog/u/{}/avatar", username)
}

/// Hive account name rules: 3-16 characters, dot-separated segments of at
/// least 3 characters, each starting with a letter, ending alphanumeric,
/// made of `a-z0-9-` with no doubled dashes.
pub fn is_valid_account_name(name: &str) -> bool {
    if !(3..=16).contains(&name.len()) {
        return false;
    }
    name.split('.').all(|segment| {
        let bytes = segment.as_bytes();
        bytes.len() >= 3
            && bytes[0].is_ascii_lowercase()
            && bytes[bytes.len() - 1].is_ascii_alphanumeric()
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            && !segment.contains("--")
    })
}

/// Resolves a username to its profile image URL.
pub struct AvatarFetcher {
    hive: Arc<HiveClient>,
}

impl AvatarFetcher {
    pub fn new(hive: Arc<HiveClient>) -> Self {
        Self { hive }
    }
}

#[async_trait]
impl Fetch<String, String> for AvatarFetcher {
    /// Accounts without a profile image get the images.hive.blog fallback;
    /// unknown accounts resolve to nothing.
    async fn fetch(&self, username: &String) -> anyhow::Result<Option<String>> {
        let accounts = self.hive.get_accounts(std::slice::from_ref(username)).await?;
        let url = accounts
            .into_iter()
            .find(|a| &a.name == username)
            .map(|a| a.profile_image().unwrap_or_else(|| fallback_avatar_url(username)));
        Ok(url)
    }

    fn is_valid_key(&self, username: &String) -> bool {
        is_valid_account_name(username)
    }
}

pub type AvatarCache = TtlCache<String, String, AvatarFetcher>;

/// Avatar cache backed by a persisted map, so known avatars render
/// immediately after a restart.
pub struct AvatarService {
    cache: AvatarCache,
    persisted: Option<PersistedMap>,
}

impl AvatarService {
    pub fn new(config: CacheConfig, hive: Arc<HiveClient>, persisted: Option<PersistedMap>) -> Self {
        Self {
            cache: TtlCache::new(config, AvatarFetcher::new(hive)),
            persisted,
        }
    }

    pub fn cache(&self) -> &AvatarCache {
        &self.cache
    }

    /// Best URL available right now, without network access.
    pub fn cached(&self, username: &str) -> Option<String> {
        match self.cache.get(&username.to_string()) {
            Some(Cached::Hit(url)) => Some(url),
            _ => self.persisted.as_ref().and_then(|p| p.get(username)),
        }
    }

    pub async fn avatar(&self, username: &str) -> Option<String> {
        if !is_valid_account_name(username) {
            debug!("Skipping avatar for invalid account '{}'", username);
            return None;
        }
        let url = self.cache.get_or_fetch(username.to_string()).await;
        if let (Some(url), Some(persisted)) = (&url, &self.persisted) {
            persisted.set(username, url);
        }
        url.or_else(|| self.persisted.as_ref().and_then(|p| p.get(username)))
    }

    pub async fn preload(&self, usernames: &[String]) -> usize {
        self.cache.preload(usernames.iter().cloned()).await
    }
}
