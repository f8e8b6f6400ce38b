use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a post or comment on chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostKey {
    pub author: String,
    pub permlink: String,
}

impl PostKey {
    pub fn new(author: impl Into<String>, permlink: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            permlink: permlink.into(),
        }
    }

    /// Parses `author/permlink`, tolerating a leading `@`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (author, permlink) = raw.trim().trim_start_matches('@').split_once('/')?;
        if author.is_empty() || permlink.is_empty() {
            return None;
        }
        Some(Self::new(author, permlink))
    }
}

impl fmt::Display for PostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}", self.author, self.permlink)
    }
}

/// A post or comment as returned by `condenser_api.get_content`.
///
/// Hive returns an all-empty object for content that does not exist, so
/// every field defaults and `is_empty` is the existence check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
    pub parent_author: String,
    pub parent_permlink: String,
    pub created: String,
}

impl Post {
    pub fn is_empty(&self) -> bool {
        self.author.is_empty()
    }

    pub fn key(&self) -> PostKey {
        PostKey::new(&self.author, &self.permlink)
    }

    /// Parent pointer, or `None` for a root post.
    pub fn parent(&self) -> Option<PostKey> {
        if self.parent_author.is_empty() {
            None
        } else {
            Some(PostKey::new(&self.parent_author, &self.parent_permlink))
        }
    }

    pub fn metadata(&self) -> PostMetadata {
        PostMetadata::parse(&self.json_metadata)
    }
}

/// The parts of `json_metadata` the client reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMetadata {
    pub app: Option<String>,
    pub tags: Vec<String>,
    pub image: Vec<String>,
}

impl PostMetadata {
    /// Never fails: malformed metadata is treated as absent.
    pub fn parse(raw: &str) -> Self {
        let mut value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return Self::default(),
        };
        // Some clients double-encode the metadata as a JSON string.
        if let Value::String(inner) = &value {
            value = match serde_json::from_str(inner) {
                Ok(v) => v,
                Err(_) => return Self::default(),
            };
        }
        let Value::Object(map) = value else {
            return Self::default();
        };

        Self {
            app: map.get("app").and_then(Value::as_str).map(str::to_string),
            tags: string_list(map.get("tags")),
            image: string_list(map.get("image")),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

/// Account fields used for avatar lookup (`condenser_api.get_accounts`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub name: String,
    pub json_metadata: String,
    pub posting_json_metadata: String,
}

impl Account {
    /// `profile.profile_image`, preferring posting metadata which is where
    /// current wallets write profile edits.
    pub fn profile_image(&self) -> Option<String> {
        [&self.posting_json_metadata, &self.json_metadata]
            .into_iter()
            .find_map(|raw| profile_image(raw))
    }
}

fn profile_image(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let url = value.get("profile")?.get("profile_image")?.as_str()?.trim();
    if url.starts_with("http") {
        Some(url.to_string())
    } else {
        None
    }
}
