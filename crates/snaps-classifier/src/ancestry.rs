use async_trait::async_trait;
use tracing::{debug, warn};

use snaps_hive::HiveClient;
use snaps_types::post::{Post, PostKey};

use crate::{CONTAINER_ACCOUNT, MAX_ANCESTOR_DEPTH, SNAP_PREFIX};

/// Source of parent posts for the thread walk.
#[async_trait]
pub trait ParentFetcher: Send + Sync {
    /// `Ok(None)` when the post does not exist.
    async fn fetch_post(&self, key: &PostKey) -> anyhow::Result<Option<Post>>;
}

#[async_trait]
impl ParentFetcher for HiveClient {
    async fn fetch_post(&self, key: &PostKey) -> anyhow::Result<Option<Post>> {
        Ok(self.get_content(key).await?)
    }
}

pub(crate) fn is_snap_root(key: &PostKey) -> bool {
    key.author == CONTAINER_ACCOUNT || key.permlink.starts_with(SNAP_PREFIX)
}

/// Walks `post`'s ancestors looking for the snap container or a snap
/// permlink.
///
/// At most [`MAX_ANCESTOR_DEPTH`] ancestors are fetched, so malformed or
/// cyclic parent chains terminate. Fetch failures end the walk as "not a
/// snap thread".
pub async fn in_snap_thread<F>(post: &Post, fetcher: &F) -> bool
where
    F: ParentFetcher + ?Sized,
{
    let mut next = post.parent();
    let mut depth = 0;

    while let Some(key) = next {
        if is_snap_root(&key) {
            return true;
        }
        if depth == MAX_ANCESTOR_DEPTH {
            debug!("Ancestor walk for {} hit depth limit", post.key());
            return false;
        }
        depth += 1;

        next = match fetcher.fetch_post(&key).await {
            Ok(Some(parent)) => parent.parent(),
            Ok(None) => return false,
            Err(e) => {
                warn!("Fetching ancestor {} failed: {}", key, e);
                return false;
            }
        };
    }

    false
}
