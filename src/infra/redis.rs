//! Redis adapters for the mutation stream and the rendered-entry store.
//!
//! Both adapters share a [`ConnectionManager`], which multiplexes and
//! reconnects internally; each call clones it, which is cheap.

use async_trait::async_trait;
use redis::streams::{
    StreamInfoConsumersReply, StreamInfoGroupsReply, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::cache::{
    EntryStore, GroupCreate, MutationMessage, MutationStream, StoreError, StreamError,
};

use super::error::InfraError;

/// Upper bound on one server-side `XREADGROUP BLOCK`, in milliseconds.
///
/// The connection manager multiplexes every caller over a single
/// connection, and Redis holds back all later commands on a connection
/// while a blocking read is parked on it. An unbounded block would queue
/// entry deletes and the exit-path `XGROUP DELCONSUMER` behind the read
/// until the next message arrived, so reads poll on a short block
/// instead and loop client-side until something is delivered.
const READ_BLOCK_MS: usize = 100;

/// Open a managed connection to the given Redis URL.
pub async fn connect(url: &str) -> Result<ConnectionManager, InfraError> {
    let client =
        Client::open(url).map_err(|err| InfraError::redis(format!("invalid redis url: {err}")))?;
    client
        .get_connection_manager()
        .await
        .map_err(|err| InfraError::redis(format!("failed to connect: {err}")))
}

/// Consumer-group stream access backed by Redis Streams.
pub struct RedisMutationStream {
    connection: ConnectionManager,
    stream_name: String,
}

impl RedisMutationStream {
    pub fn new(connection: ConnectionManager, stream_name: impl Into<String>) -> Self {
        Self {
            connection,
            stream_name: stream_name.into(),
        }
    }
}

#[async_trait]
impl MutationStream for RedisMutationStream {
    async fn stream_exists(&self) -> Result<bool, StreamError> {
        let mut conn = self.connection.clone();
        conn.exists(&self.stream_name)
            .await
            .map_err(StreamError::from_backend)
    }

    async fn group_exists(&self, group: &str) -> Result<bool, StreamError> {
        let mut conn = self.connection.clone();
        let reply: StreamInfoGroupsReply = conn
            .xinfo_groups(&self.stream_name)
            .await
            .map_err(StreamError::from_backend)?;
        Ok(reply.groups.iter().any(|info| info.name == group))
    }

    async fn create_group(&self, group: &str) -> Result<GroupCreate, StreamError> {
        let mut conn = self.connection.clone();
        // `$` starts delivery at the stream tail; MKSTREAM creates the
        // stream when the producer has not written yet.
        let result: Result<String, redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_name)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match result {
            Ok(_) => Ok(GroupCreate::Created),
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(GroupCreate::AlreadyExists),
            Err(err) => Err(StreamError::from_backend(err)),
        }
    }

    async fn consumer_exists(&self, group: &str, consumer: &str) -> Result<bool, StreamError> {
        let mut conn = self.connection.clone();
        let reply: StreamInfoConsumersReply = conn
            .xinfo_consumers(&self.stream_name, group)
            .await
            .map_err(StreamError::from_backend)?;
        Ok(reply.consumers.iter().any(|info| info.name == consumer))
    }

    async fn create_consumer(&self, group: &str, consumer: &str) -> Result<bool, StreamError> {
        let mut conn = self.connection.clone();
        let created: i64 = redis::cmd("XGROUP")
            .arg("CREATECONSUMER")
            .arg(&self.stream_name)
            .arg(group)
            .arg(consumer)
            .query_async(&mut conn)
            .await
            .map_err(StreamError::from_backend)?;
        Ok(created > 0)
    }

    async fn delete_consumer(&self, group: &str, consumer: &str) -> Result<(), StreamError> {
        let mut conn = self.connection.clone();
        // Returns the consumer's pending-entry count, which this reader
        // keeps at zero by acking through the group cursor.
        let _pending: i64 = conn
            .xgroup_delconsumer(&self.stream_name, group, consumer)
            .await
            .map_err(StreamError::from_backend)?;
        Ok(())
    }

    async fn append(&self, fields: &[(String, String)]) -> Result<String, StreamError> {
        let mut conn = self.connection.clone();
        conn.xadd(&self.stream_name, "*", fields)
            .await
            .map_err(StreamError::from_backend)
    }

    async fn read(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<MutationMessage>, StreamError> {
        let mut conn = self.connection.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(READ_BLOCK_MS);
        loop {
            let reply: StreamReadReply = conn
                .xread_options(&[&self.stream_name], &[">"], &options)
                .await
                .map_err(StreamError::from_backend)?;
            let messages = messages_from_reply(reply)?;
            if !messages.is_empty() {
                return Ok(messages);
            }
        }
    }
}

fn messages_from_reply(reply: StreamReadReply) -> Result<Vec<MutationMessage>, StreamError> {
    let mut messages = Vec::new();
    for key in reply.keys {
        for entry in key.ids {
            let mut fields = std::collections::HashMap::with_capacity(entry.map.len());
            for (field, value) in &entry.map {
                let value: String =
                    redis::from_redis_value(value).map_err(StreamError::from_backend)?;
                fields.insert(field.clone(), value);
            }
            messages.push(MutationMessage::new(entry.id, fields));
        }
    }
    Ok(messages)
}

/// Rendered-entry storage backed by plain Redis keys.
pub struct RedisEntryStore {
    connection: ConnectionManager,
    entry_ttl_seconds: Option<u64>,
}

impl RedisEntryStore {
    /// `entry_ttl_seconds` is the expiry applied to every stored entry;
    /// `None` stores entries without expiry, leaving invalidation as the
    /// only way an entry disappears.
    pub fn new(connection: ConnectionManager, entry_ttl_seconds: Option<u64>) -> Self {
        Self {
            connection,
            entry_ttl_seconds,
        }
    }
}

#[async_trait]
impl EntryStore for RedisEntryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(StoreError::from_backend)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        match self.entry_ttl_seconds {
            Some(seconds) => conn
                .set_ex(key, value, seconds)
                .await
                .map_err(StoreError::from_backend),
            None => conn.set(key, value).await.map_err(StoreError::from_backend),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await.map_err(StoreError::from_backend)?;
        Ok(removed > 0)
    }
}
