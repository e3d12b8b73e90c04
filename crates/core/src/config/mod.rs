//! Per-feed configuration.
//!
//! Each feed has a [`FeedSelectorConfig`]: its ordered selector rules,
//! optional custom CSS, and an optional login descriptor whose password is
//! only ever persisted encrypted. All records live in one JSON blob behind a
//! [`KeyValueBackend`].

pub mod model;
pub mod store;

pub use model::{ExtraField, FeedAuthConfig, FeedSelectorConfig, StoredAuthConfig};
pub use store::{ConfigStore, FEED_CONFIG_KEY, FileBackend, KeyValueBackend, MemoryBackend};
