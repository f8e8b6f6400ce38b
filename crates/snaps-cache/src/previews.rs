use std::sync::Arc;

use async_trait::async_trait;

use snaps_hive::HiveClient;
use snaps_types::post::{Post, PostKey};

use crate::avatars::is_valid_account_name;
use crate::ttl::{Fetch, TtlCache};

const EXCERPT_CHARS: usize = 200;

/// Enough of a post to render a link card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPreview {
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub excerpt: String,
    pub image: Option<String>,
}

impl PostPreview {
    pub fn from_post(post: &Post) -> Self {
        Self {
            author: post.author.clone(),
            permlink: post.permlink.clone(),
            title: post.title.clone(),
            excerpt: excerpt(&post.body),
            image: post.metadata().image.into_iter().next(),
        }
    }
}

/// Plain-text start of a markdown body: image embeds and bare links are
/// dropped, whitespace collapsed, and the result cut at a word boundary.
fn excerpt(body: &str) -> String {
    let words: Vec<&str> = body
        .split_whitespace()
        .filter(|w| !w.starts_with("![") && !w.starts_with("http"))
        .collect();

    let mut out = String::new();
    for word in words {
        let needed = if out.is_empty() { word.chars().count() } else { word.chars().count() + 1 };
        if out.chars().count() + needed > EXCERPT_CHARS {
            out.push('…');
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

pub struct PostPreviewFetcher {
    hive: Arc<HiveClient>,
}

impl PostPreviewFetcher {
    pub fn new(hive: Arc<HiveClient>) -> Self {
        Self { hive }
    }
}

#[async_trait]
impl Fetch<PostKey, PostPreview> for PostPreviewFetcher {
    async fn fetch(&self, key: &PostKey) -> anyhow::Result<Option<PostPreview>> {
        let post = self.hive.get_content(key).await?;
        Ok(post.as_ref().map(PostPreview::from_post))
    }

    fn is_valid_key(&self, key: &PostKey) -> bool {
        is_valid_account_name(&key.author) && !key.permlink.is_empty()
    }
}

pub type PostPreviewCache = TtlCache<PostKey, PostPreview, PostPreviewFetcher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_from_post() {
        let post = Post {
            author: "alice".into(),
            permlink: "trip".into(),
            title: "My trip".into(),
            body: "![cover](https://img/a.png)\n\nWe   went to\nthe coast. https://example.com".into(),
            json_metadata: r#"{"image":["https://img/a.png"]}"#.into(),
            ..Default::default()
        };
        let preview = PostPreview::from_post(&post);
        assert_eq!(preview.excerpt, "We went to the coast.");
        assert_eq!(preview.image.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn long_excerpt_is_cut() {
        let text = excerpt(&"word ".repeat(100));
        assert!(text.ends_with('…'));
        assert!(text.chars().count() <= EXCERPT_CHARS + 1);
    }

    #[test]
    fn key_validation() {
        let hive = Arc::new(HiveClient::new(vec!["http://127.0.0.1:9".into()]).unwrap());
        let fetcher = PostPreviewFetcher::new(hive);
        assert!(fetcher.is_valid_key(&PostKey::new("alice", "trip")));
        assert!(!fetcher.is_valid_key(&PostKey::new("Alice", "trip")));
        assert!(!fetcher.is_valid_key(&PostKey::new("alice", "")));
    }
}
