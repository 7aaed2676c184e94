//! Storage-shaped records: flat property maps with reference-only values.
//!
//! This is the canonical shape the cache serves. It shares the wire format of
//! the deep shape but rejects inlined child records; the flattener is the only
//! producer that converts between the two.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::deep::DeepRecord;
use super::error::DomainError;
use super::value::{Id, Value};

/// Reserved predicate carrying a record's own id on the wire.
pub const RESERVED_ID_FIELD: &str = "_id";

/// The flat property map of one resource: predicate to ordered value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DeepRecord", try_from = "DeepRecord")]
pub struct Record {
    id: Id,
    fields: IndexMap<String, Vec<Value>>,
}

impl Record {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            fields: IndexMap::new(),
        }
    }

    pub(crate) fn from_parts(id: Id, fields: IndexMap<String, Vec<Value>>) -> Self {
        Self { id, fields }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Random access to one predicate's value list. The reserved `_id`
    /// pseudo-field is not reachable through this accessor.
    pub fn field(&self, predicate: &str) -> Result<Option<&[Value]>, DomainError> {
        if predicate == RESERVED_ID_FIELD {
            return Err(DomainError::ReservedField);
        }
        Ok(self.fields.get(predicate).map(Vec::as_slice))
    }

    /// Replace the full value list for a predicate. Nested records are not
    /// representable in storage shape.
    pub fn set_field(
        &mut self,
        predicate: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), DomainError> {
        let predicate = predicate.into();
        if predicate == RESERVED_ID_FIELD {
            return Err(DomainError::ReservedField);
        }
        if values.iter().any(|value| matches!(value, Value::Nested(_))) {
            return Err(DomainError::invariant(
                "nested record in storage-shaped field",
            ));
        }
        self.fields.insert(predicate, values);
        Ok(())
    }

    /// Append a single value to a predicate's list, creating the list when
    /// absent. Used by ingestion, which sees one statement at a time.
    pub fn append_value(
        &mut self,
        predicate: impl Into<String>,
        value: Value,
    ) -> Result<(), DomainError> {
        let predicate = predicate.into();
        if predicate == RESERVED_ID_FIELD {
            return Err(DomainError::ReservedField);
        }
        if matches!(value, Value::Nested(_)) {
            return Err(DomainError::invariant(
                "nested record in storage-shaped field",
            ));
        }
        self.fields.entry(predicate).or_default().push(value);
        Ok(())
    }

    /// Predicates and their value lists in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.fields
            .iter()
            .map(|(predicate, values)| (predicate.as_str(), values.as_slice()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// First non-empty value for a predicate, for consumers that require
    /// meaningful content (metadata lookup skips empty strings).
    pub fn first_meaningful(&self, predicate: &str) -> Result<Option<&Value>, DomainError> {
        Ok(self
            .field(predicate)?
            .and_then(|values| values.iter().find(|value| value.is_meaningful())))
    }
}

impl From<Record> for DeepRecord {
    fn from(record: Record) -> Self {
        DeepRecord::from_parts(record.id, record.fields)
    }
}

impl TryFrom<DeepRecord> for Record {
    type Error = DomainError;

    fn try_from(record: DeepRecord) -> Result<Self, Self::Error> {
        let (id, fields) = record.into_parts();
        for values in fields.values() {
            if values.iter().any(|value| matches!(value, Value::Nested(_))) {
                return Err(DomainError::invariant(
                    "nested record in storage-shaped document; flatten it first",
                ));
            }
        }
        Ok(Record { id, fields })
    }
}

/// A complete flat snapshot: records keyed by resource id, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSlice(IndexMap<String, Record>);

impl DataSlice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its own id. A later insert for the same id
    /// replaces the earlier record wholesale.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.0.insert(record.id().as_str().to_owned(), record)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.0.get(id)
    }

    /// Mutable access to the record for `id`, creating an empty one when
    /// absent.
    pub fn entry(&mut self, id: Id) -> &mut Record {
        self.0
            .entry(id.as_str().to_owned())
            .or_insert_with(|| Record::new(id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.0.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
