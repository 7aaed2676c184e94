//! Mutation stream trait describing the transaction log adapter.

use async_trait::async_trait;
use thiserror::Error;

use super::events::MutationMessage;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream backend error: {message}")]
    Backend { message: String },
}

impl StreamError {
    pub fn from_backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

/// Outcome of an idempotent group-creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCreate {
    Created,
    AlreadyExists,
}

/// Consumer-group view of the shared mutation stream.
///
/// Reads are group reads: each message is delivered to exactly one consumer
/// within the group, and distinct groups each see the full stream.
#[async_trait]
pub trait MutationStream: Send + Sync {
    async fn stream_exists(&self) -> Result<bool, StreamError>;

    async fn group_exists(&self, group: &str) -> Result<bool, StreamError>;

    /// Create the consumer group, creating the stream alongside it when
    /// absent. Reading starts at the tail: only mutations committed after
    /// this call are delivered, which is correct because entries rendered
    /// earlier reflect the store as of their own render time.
    async fn create_group(&self, group: &str) -> Result<GroupCreate, StreamError>;

    async fn consumer_exists(&self, group: &str, consumer: &str) -> Result<bool, StreamError>;

    /// Register a named consumer in the group. Returns `true` when the
    /// consumer was newly created.
    async fn create_consumer(&self, group: &str, consumer: &str) -> Result<bool, StreamError>;

    async fn delete_consumer(&self, group: &str, consumer: &str) -> Result<(), StreamError>;

    /// Append a message to the stream, returning its assigned entry id.
    async fn append(&self, fields: &[(String, String)]) -> Result<String, StreamError>;

    /// Block until at least one undelivered message is available for this
    /// consumer, returning up to `count` of them.
    async fn read(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<MutationMessage>, StreamError>;
}
