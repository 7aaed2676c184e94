//! Invalidation worker configuration.

use std::num::NonZeroUsize;

use uuid::Uuid;

const DEFAULT_STREAM_NAME: &str = "transactions";
const DEFAULT_GROUP: &str = "specchio";
const DEFAULT_READ_BATCH: usize = 16;

/// Runtime configuration for one invalidation worker.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name of the shared mutation stream.
    pub stream_name: String,
    /// Consumer group this service reads as. All replicas share it, so each
    /// mutation is handled once.
    pub group: String,
    /// This replica's consumer name within the group.
    pub consumer: String,
    /// Languages rendered entries exist in. One key per language is dropped
    /// for every invalidated resource.
    pub languages: Vec<String>,
    /// Maximum messages pulled per group read.
    pub read_batch: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stream_name: DEFAULT_STREAM_NAME.to_owned(),
            group: DEFAULT_GROUP.to_owned(),
            consumer: default_consumer_name(),
            languages: vec!["en".to_owned(), "nl".to_owned()],
            read_batch: NonZeroUsize::new(DEFAULT_READ_BATCH).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            stream_name: settings.stream_name.clone(),
            group: settings.group.clone(),
            consumer: settings
                .consumer
                .clone()
                .unwrap_or_else(default_consumer_name),
            languages: settings.languages.clone(),
            read_batch: settings.read_batch,
        }
    }
}

/// Consumer names must be unique per replica or group reads would starve
/// one of them.
fn default_consumer_name() -> String {
    format!("specchio-{}", Uuid::new_v4())
}
