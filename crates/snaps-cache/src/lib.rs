//! Time-bounded caches for data the feed renders repeatedly: avatars and
//! post previews.
//!
//! Each cache is an explicitly constructed [`TtlCache`] around a fetcher;
//! there is no global instance.

pub mod avatars;
pub mod previews;
pub mod ttl;

pub use avatars::{AvatarCache, AvatarFetcher, AvatarService, fallback_avatar_url, is_valid_account_name};
pub use previews::{PostPreview, PostPreviewCache, PostPreviewFetcher};
pub use ttl::{CacheConfig, Cached, Fetch, TtlCache};
