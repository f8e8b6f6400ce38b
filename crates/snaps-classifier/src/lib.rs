//! Decides whether content is a snap (short-form, chat-like feed item) or
//! an ordinary long-form post.
//!
//! Checks run in a fixed order and the first hit wins; see [`CHECK_ORDER`].

pub mod ancestry;
pub mod checks;

pub use ancestry::{ParentFetcher, in_snap_thread};
pub use checks::{CHECK_ORDER, Check, Classification, classify, classify_local};

/// Permlink prefix reserved for snaps.
pub const SNAP_PREFIX: &str = "snap-";

/// Account every top-level snap is posted under.
pub const CONTAINER_ACCOUNT: &str = "peak.snaps";

/// `json_metadata.app` written by the HiveSnaps client (optionally `/version`).
pub const SNAPS_APP_ID: &str = "hivesnaps";

pub const SNAPS_TAG: &str = "hivesnaps";
pub const SNAPS_HASHTAG: &str = "#hivesnaps";

/// Bodies shorter than this (in characters) count as short-form.
pub const SHORT_BODY_LIMIT: usize = 500;

/// Shorter permlinks are malformed and classify as ordinary.
pub const MIN_PERMLINK_LEN: usize = 3;

/// Maximum number of ancestors fetched while walking a thread upward.
pub const MAX_ANCESTOR_DEPTH: usize = 10;
