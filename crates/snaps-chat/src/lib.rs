//! Chat service access and the polling loop that keeps unread badges and
//! the open conversation fresh.

pub mod api;
pub mod client;
pub mod error;
pub mod sync;
pub mod timer;
pub mod unread;

pub use api::{ChatApi, Session};
pub use client::ChatClient;
pub use error::ChatError;
pub use sync::{PollConfig, PollState, Presence, SyncEvent, Synchronizer};
pub use timer::{Tick, TimerDriver, TokioTimer};
pub use unread::aggregate;
