use tracing::debug;

use snaps_types::post::{Post, PostMetadata};

use crate::ancestry::{ParentFetcher, in_snap_thread};
use crate::{
    CONTAINER_ACCOUNT, MIN_PERMLINK_LEN, SHORT_BODY_LIMIT, SNAP_PREFIX, SNAPS_APP_ID,
    SNAPS_HASHTAG, SNAPS_TAG,
};

/// One snap indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Permlink carries the snap prefix.
    ReservedPermlink,
    /// Direct reply to the container account.
    ContainerParent,
    /// Parent permlink carries the snap prefix.
    ReservedParentPermlink,
    /// Some ancestor is a snap or the container.
    AncestorChain,
    /// `json_metadata` names the snaps app, or the snaps tag is corroborated.
    Metadata,
    /// Short, untitled, top-level body.
    ShortShape,
    /// `#hivesnaps` in the body.
    Hashtag,
}

/// Evaluation order. Earlier checks are cheaper or more specific.
pub const CHECK_ORDER: [Check; 7] = [
    Check::ReservedPermlink,
    Check::ContainerParent,
    Check::ReservedParentPermlink,
    Check::AncestorChain,
    Check::Metadata,
    Check::ShortShape,
    Check::Hashtag,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Short-form; carries the check that matched.
    Snap(Check),
    Ordinary,
}

impl Classification {
    pub fn is_snap(self) -> bool {
        matches!(self, Self::Snap(_))
    }

    pub fn reason(self) -> Option<Check> {
        match self {
            Self::Snap(check) => Some(check),
            Self::Ordinary => None,
        }
    }
}

impl Check {
    /// Evaluates checks that need nothing beyond the post itself.
    /// `AncestorChain` needs a fetcher and is always false here.
    fn matches_local(self, post: &Post, meta: &PostMetadata) -> bool {
        match self {
            Self::ReservedPermlink => post.permlink.starts_with(SNAP_PREFIX),
            Self::ContainerParent => post.parent_author == CONTAINER_ACCOUNT,
            Self::ReservedParentPermlink => post.parent_permlink.starts_with(SNAP_PREFIX),
            Self::AncestorChain => false,
            Self::Metadata => metadata_indicates_snap(post, meta),
            Self::ShortShape => {
                is_short(&post.body) && post.title.trim().is_empty() && post.parent_author.is_empty()
            }
            Self::Hashtag => has_snaps_hashtag(&post.body),
        }
    }
}

/// Full classification, walking the thread through `fetcher` if needed.
pub async fn classify<F>(post: &Post, fetcher: &F) -> Classification
where
    F: ParentFetcher + ?Sized,
{
    if post.permlink.len() < MIN_PERMLINK_LEN {
        return Classification::Ordinary;
    }
    let meta = post.metadata();

    for check in CHECK_ORDER {
        let hit = match check {
            Check::AncestorChain => in_snap_thread(post, fetcher).await,
            other => other.matches_local(post, &meta),
        };
        if hit {
            debug!("{} is a snap ({:?})", post.key(), check);
            return Classification::Snap(check);
        }
    }
    Classification::Ordinary
}

/// Classification without network access; skips the ancestor walk.
pub fn classify_local(post: &Post) -> Classification {
    if post.permlink.len() < MIN_PERMLINK_LEN {
        return Classification::Ordinary;
    }
    let meta = post.metadata();

    CHECK_ORDER
        .into_iter()
        .find(|check| check.matches_local(post, &meta))
        .map_or(Classification::Ordinary, Classification::Snap)
}

// The app id is authoritative on its own. The tag is written by several
// frontends, so it only counts with a second, independent indicator.
fn metadata_indicates_snap(post: &Post, meta: &PostMetadata) -> bool {
    if meta.app.as_deref().is_some_and(is_snaps_app) {
        return true;
    }
    meta.has_tag(SNAPS_TAG) && has_snaps_hashtag(&post.body)
}

fn is_snaps_app(app: &str) -> bool {
    let name = app.split('/').next().unwrap_or_default().trim();
    name.eq_ignore_ascii_case(SNAPS_APP_ID)
}

fn is_short(body: &str) -> bool {
    body.chars().count() < SHORT_BODY_LIMIT
}

fn has_snaps_hashtag(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.match_indices(SNAPS_HASHTAG).any(|(idx, token)| {
        lower[idx + token.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '-'))
    })
}
