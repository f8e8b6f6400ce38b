use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use snaps_chat::PollConfig;

const DEFAULT_CHAT_URL: &str = "https://ecency.com";
const DEFAULT_DB_PATH: &str = "hivesnaps.db";
const DEFAULT_SWEEP_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub chat_url: String,
    /// `None` uses the built-in node list.
    pub hive_nodes: Option<Vec<String>>,
    pub db_path: PathBuf,
    pub username: Option<String>,
    pub chat_token: Option<String>,
    pub poll: PollConfig,
    pub cache_sweep: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            match var(key) {
                Some(raw) => {
                    let secs: u64 = raw.parse().with_context(|| format!("{} must be a number of seconds", key))?;
                    anyhow::ensure!(secs > 0, "{} must be positive", key);
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };

        let defaults = PollConfig::default();
        let poll = PollConfig {
            active: secs("SNAPS_POLL_ACTIVE_SECS", defaults.active)?,
            background: secs("SNAPS_POLL_BACKGROUND_SECS", defaults.background)?,
            inactive: secs("SNAPS_POLL_INACTIVE_SECS", defaults.inactive)?,
        };

        let hive_nodes = var("SNAPS_HIVE_NODES").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Ok(Self {
            chat_url: var("SNAPS_CHAT_URL").unwrap_or_else(|| DEFAULT_CHAT_URL.into()),
            hive_nodes: hive_nodes.filter(|n| !n.is_empty()),
            db_path: PathBuf::from(var("SNAPS_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into())),
            username: var("SNAPS_USERNAME"),
            chat_token: var("SNAPS_CHAT_TOKEN"),
            poll,
            cache_sweep: secs("SNAPS_CACHE_SWEEP_SECS", Duration::from_secs(DEFAULT_SWEEP_SECS))?,
        })
    }
}
