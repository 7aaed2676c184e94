//! Invalidation worker.
//!
//! Consumes the shared mutation stream as one consumer in this service's
//! group and drops the rendered entries a mutation makes stale. Lifecycle:
//! bootstrap the group, register the consumer, read until shutdown or
//! failure, always deregister the consumer on the way out.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::OperationKind;

use super::config::CacheConfig;
use super::events::{FIELD_RESOURCE, MutationMessage};
use super::keys::entry_key;
use super::store::{EntryStore, StoreError};
use super::stream::{GroupCreate, MutationStream, StreamError};

const METRIC_MESSAGES_TOTAL: &str = "specchio_invalidation_messages_total";
const METRIC_IGNORED_TOTAL: &str = "specchio_invalidation_ignored_total";
const METRIC_KEYS_DROPPED_TOTAL: &str = "specchio_invalidation_keys_dropped_total";
const METRIC_DELETE_FAILURES_TOTAL: &str = "specchio_invalidation_delete_failures_total";
const METRIC_PROCESS_MS: &str = "specchio_invalidation_process_ms";

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[source] StreamError),
    #[error("consumer `{consumer}` could not be registered in group `{group}`")]
    Registration { group: String, consumer: String },
    #[error("message `{message_id}` is missing required field `{field}`")]
    MalformedMessage { message_id: String, field: String },
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalidation worker ended unexpectedly: {0}")]
    Worker(String),
}

/// One invalidation worker. Cheap to construct; all state lives behind the
/// stream and store adapters.
pub struct Invalidator {
    config: CacheConfig,
    stream: Arc<dyn MutationStream>,
    store: Arc<dyn EntryStore>,
}

impl Invalidator {
    pub fn new(
        config: CacheConfig,
        stream: Arc<dyn MutationStream>,
        store: Arc<dyn EntryStore>,
    ) -> Self {
        Self {
            config,
            stream,
            store,
        }
    }

    /// Ensure the stream and this service's consumer group exist. Skips
    /// creation when both are already present, so restarts keep the group's
    /// delivery cursor.
    pub async fn bootstrap(&self) -> Result<(), InvalidationError> {
        let stream_present = self
            .stream
            .stream_exists()
            .await
            .map_err(InvalidationError::Bootstrap)?;
        if stream_present
            && self
                .stream
                .group_exists(&self.config.group)
                .await
                .map_err(InvalidationError::Bootstrap)?
        {
            debug!(
                stream = %self.config.stream_name,
                group = %self.config.group,
                "stream and group already present"
            );
            return Ok(());
        }

        match self
            .stream
            .create_group(&self.config.group)
            .await
            .map_err(InvalidationError::Bootstrap)?
        {
            GroupCreate::Created => info!(
                stream = %self.config.stream_name,
                group = %self.config.group,
                "created consumer group"
            ),
            // Another replica won the race; same outcome.
            GroupCreate::AlreadyExists => debug!(
                stream = %self.config.stream_name,
                group = %self.config.group,
                "consumer group created concurrently"
            ),
        }
        Ok(())
    }

    /// Register this replica's consumer in the group. A consumer that exists
    /// already is fine (a previous run of the same replica); failing to
    /// create a missing one is fatal, since group reads would never deliver
    /// to us.
    pub async fn register(&self) -> Result<(), InvalidationError> {
        if self
            .stream
            .consumer_exists(&self.config.group, &self.config.consumer)
            .await?
        {
            debug!(consumer = %self.config.consumer, "consumer already registered");
            return Ok(());
        }
        let created = self
            .stream
            .create_consumer(&self.config.group, &self.config.consumer)
            .await?;
        if !created {
            return Err(InvalidationError::Registration {
                group: self.config.group.clone(),
                consumer: self.config.consumer.clone(),
            });
        }
        info!(
            group = %self.config.group,
            consumer = %self.config.consumer,
            "registered stream consumer"
        );
        Ok(())
    }

    /// Handle one mutation message.
    ///
    /// Unrecognized operation kinds are skipped: the taxonomy grows upstream
    /// and an old reader must not crash on a new kind. A message without a
    /// resource is malformed and fails the worker.
    pub async fn process(&self, message: &MutationMessage) -> Result<(), InvalidationError> {
        let started_at = Instant::now();
        counter!(METRIC_MESSAGES_TOTAL).increment(1);

        message
            .resource()
            .ok_or_else(|| InvalidationError::MalformedMessage {
                message_id: message.id.clone(),
                field: FIELD_RESOURCE.to_owned(),
            })?;

        // The resource is present, so a missing operation can only mean an
        // unrecognized kind.
        let Some(operation) = message.operation() else {
            counter!(METRIC_IGNORED_TOTAL).increment(1);
            debug!(
                message_id = %message.id,
                kind = message.raw_kind().unwrap_or("<missing>"),
                "ignoring unrecognized operation kind"
            );
            return Ok(());
        };

        match operation.kind {
            OperationKind::Updated | OperationKind::Deleted => {
                self.drop_entries(&operation.resource, operation.kind).await;
            }
            // Created resources have no entries yet. Moved and Converted
            // arrive alongside an Updated for the same resource, and
            // publication state is part of the rendered data, so Published
            // and Unpublished are likewise covered by their Updated.
            OperationKind::Created
            | OperationKind::Converted
            | OperationKind::Moved
            | OperationKind::Published
            | OperationKind::Unpublished => {
                counter!(METRIC_IGNORED_TOTAL).increment(1);
                debug!(
                    message_id = %message.id,
                    kind = operation.kind.as_str(),
                    resource = %operation.resource,
                    "operation kind requires no invalidation"
                );
            }
        }

        histogram!(METRIC_PROCESS_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    /// Drop the rendered entries for one resource across all configured
    /// languages. Failures are logged and counted, never retried: the entry
    /// stays stale until its next render, which is preferable to wedging the
    /// group cursor on one bad key.
    async fn drop_entries(&self, resource: &str, kind: OperationKind) {
        for language in &self.config.languages {
            let key = entry_key(resource, language);
            match self.store.delete(&key).await {
                Ok(true) => {
                    counter!(METRIC_KEYS_DROPPED_TOTAL).increment(1);
                    info!(kind = kind.as_str(), %key, "dropped rendered entry");
                }
                Ok(false) => {
                    debug!(kind = kind.as_str(), %key, "no rendered entry to drop");
                }
                Err(err) => {
                    counter!(METRIC_DELETE_FAILURES_TOTAL).increment(1);
                    error!(kind = kind.as_str(), %key, error = %err, "failed to drop rendered entry");
                }
            }
        }
    }

    async fn read_loop(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), InvalidationError> {
        loop {
            let batch = tokio::select! {
                _ = shutdown.changed() => {
                    info!(consumer = %self.config.consumer, "invalidation worker shutting down");
                    return Ok(());
                }
                read = self.stream.read(
                    &self.config.group,
                    &self.config.consumer,
                    self.config.read_batch.get(),
                ) => read?,
            };
            for message in &batch {
                self.process(message).await?;
            }
        }
    }

    /// Full worker lifecycle. The consumer is deregistered on every exit
    /// path so the group does not accumulate dead consumers; a cleanup
    /// failure is logged but never masks the loop's own result.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), InvalidationError> {
        self.bootstrap().await?;
        self.register().await?;

        let outcome = self.read_loop(shutdown).await;

        if let Err(err) = self
            .stream
            .delete_consumer(&self.config.group, &self.config.consumer)
            .await
        {
            warn!(
                consumer = %self.config.consumer,
                error = %err,
                "failed to deregister stream consumer"
            );
        } else {
            debug!(consumer = %self.config.consumer, "deregistered stream consumer");
        }

        outcome
    }

    /// Run the worker on its own task, returning a handle that can stop it.
    pub fn spawn(self) -> InvalidatorHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        InvalidatorHandle { shutdown: tx, task }
    }
}

/// Handle to a spawned invalidation worker.
pub struct InvalidatorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), InvalidationError>>,
}

impl InvalidatorHandle {
    /// Wait for the worker to end on its own (an error, or a closed stream).
    pub async fn finished(&mut self) -> Result<(), InvalidationError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(err) => Err(InvalidationError::Worker(err.to_string())),
        }
    }

    /// Signal shutdown and wait for the worker to finish cleanup.
    pub async fn shutdown(self) -> Result<(), InvalidationError> {
        // The worker may already be gone; a send failure only means that.
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(InvalidationError::Worker(err.to_string())),
        }
    }
}
