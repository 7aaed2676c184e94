//! In-memory doubles for the stream and store seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use specchio::cache::{
    EntryStore, GroupCreate, MutationMessage, MutationStream, StoreError, StreamError,
};

#[derive(Default)]
struct StreamState {
    entries: Vec<(String, HashMap<String, String>)>,
    cursor: usize,
    stream_created: bool,
    group: Option<String>,
    consumers: HashSet<String>,
    group_create_calls: usize,
    deleted_consumers: Vec<String>,
}

/// Single-group, single-consumer rendition of the stream contract. Reads
/// block on a [`Notify`] until an append lands.
#[derive(Default)]
pub struct InMemoryStream {
    state: Mutex<StreamState>,
    arrivals: Notify,
}

impl InMemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_fields(&self, fields: &[(&str, &str)]) {
        let mut state = self.state.lock().expect("stream state");
        let id = format!("{}-0", state.entries.len() + 1);
        state.entries.push((
            id,
            fields
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        ));
        drop(state);
        self.arrivals.notify_one();
    }

    pub fn group_create_calls(&self) -> usize {
        self.state.lock().expect("stream state").group_create_calls
    }

    pub fn deleted_consumers(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("stream state")
            .deleted_consumers
            .clone()
    }
}

#[async_trait]
impl MutationStream for InMemoryStream {
    async fn stream_exists(&self) -> Result<bool, StreamError> {
        Ok(self.state.lock().expect("stream state").stream_created)
    }

    async fn group_exists(&self, group: &str) -> Result<bool, StreamError> {
        Ok(self.state.lock().expect("stream state").group.as_deref() == Some(group))
    }

    async fn create_group(&self, group: &str) -> Result<GroupCreate, StreamError> {
        let mut state = self.state.lock().expect("stream state");
        state.group_create_calls += 1;
        state.stream_created = true;
        if state.group.as_deref() == Some(group) {
            return Ok(GroupCreate::AlreadyExists);
        }
        state.group = Some(group.to_owned());
        Ok(GroupCreate::Created)
    }

    async fn consumer_exists(&self, _group: &str, consumer: &str) -> Result<bool, StreamError> {
        Ok(self
            .state
            .lock()
            .expect("stream state")
            .consumers
            .contains(consumer))
    }

    async fn create_consumer(&self, _group: &str, consumer: &str) -> Result<bool, StreamError> {
        Ok(self
            .state
            .lock()
            .expect("stream state")
            .consumers
            .insert(consumer.to_owned()))
    }

    async fn delete_consumer(&self, _group: &str, consumer: &str) -> Result<(), StreamError> {
        let mut state = self.state.lock().expect("stream state");
        state.consumers.remove(consumer);
        state.deleted_consumers.push(consumer.to_owned());
        Ok(())
    }

    async fn append(&self, fields: &[(String, String)]) -> Result<String, StreamError> {
        let mut state = self.state.lock().expect("stream state");
        let id = format!("{}-0", state.entries.len() + 1);
        state.entries.push((id.clone(), fields.iter().cloned().collect()));
        drop(state);
        self.arrivals.notify_one();
        Ok(id)
    }

    async fn read(
        &self,
        _group: &str,
        _consumer: &str,
        count: usize,
    ) -> Result<Vec<MutationMessage>, StreamError> {
        loop {
            let notified = self.arrivals.notified();
            {
                let mut state = self.state.lock().expect("stream state");
                if state.cursor < state.entries.len() {
                    let end = (state.cursor + count).min(state.entries.len());
                    let batch = state.entries[state.cursor..end]
                        .iter()
                        .map(|(id, fields)| MutationMessage::new(id.clone(), fields.clone()))
                        .collect();
                    state.cursor = end;
                    return Ok(batch);
                }
            }
            notified.await;
        }
    }
}

/// Hash-map entry store that records every delete it is asked for.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
    deletes: Mutex<Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().expect("delete log").clone()
    }
}

#[async_trait]
impl EntryStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().expect("store entries").get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("store entries")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.deletes.lock().expect("delete log").push(key.to_owned());
        Ok(self
            .entries
            .lock()
            .expect("store entries")
            .remove(key)
            .is_some())
    }
}
