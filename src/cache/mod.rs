//! Specchio Invalidation System
//!
//! Keeps the rendered-entry cache consistent with the upstream content
//! store:
//!
//! - **Keys**: one rendered entry per resource per language,
//!   `cache:entry:<resource>:<language>`
//! - **Worker**: a consumer-group reader of the shared mutation stream that
//!   drops entries mutated resources made stale
//!
//! ## Configuration
//!
//! Worker behavior is controlled via `specchio.toml`:
//!
//! ```toml
//! [cache]
//! stream_name = "transactions"
//! group = "specchio"
//! languages = ["en", "nl"]
//! # ... see config.rs for all options
//! ```

mod config;
mod events;
mod invalidator;
pub mod keys;
mod store;
mod stream;

pub use config::CacheConfig;
pub use events::{FIELD_RESOURCE, FIELD_RESOURCE_TYPE, FIELD_TYPE, MutationMessage};
pub use invalidator::{InvalidationError, Invalidator, InvalidatorHandle};
pub use keys::{KeyError, entry_key, parse_entry_key};
pub use store::{EntryStore, StoreError};
pub use stream::{GroupCreate, MutationStream, StreamError};
