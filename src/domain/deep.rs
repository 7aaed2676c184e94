//! Transport-shaped records: field values may be fully inlined child records.

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::error::DomainError;
use super::record::RESERVED_ID_FIELD;
use super::value::{Id, Value};

/// A resource in transport shape. Identical to [`super::record::Record`]
/// except that field lists may contain [`Value::Nested`] children, recursively
/// and to unbounded depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepRecord {
    id: Id,
    fields: IndexMap<String, Vec<Value>>,
}

impl DeepRecord {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            fields: IndexMap::new(),
        }
    }

    pub(crate) fn from_parts(id: Id, fields: IndexMap<String, Vec<Value>>) -> Self {
        Self { id, fields }
    }

    pub(crate) fn into_parts(self) -> (Id, IndexMap<String, Vec<Value>>) {
        (self.id, self.fields)
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

    /// Replace the full value list for a predicate.
    pub fn set_field(
        &mut self,
        predicate: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), DomainError> {
        let predicate = predicate.into();
        if predicate == RESERVED_ID_FIELD {
            return Err(DomainError::ReservedField);
        }
        self.fields.insert(predicate, values);
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

    /// True when any direct field value is an inlined child record.
    pub fn has_nested(&self) -> bool {
        self.fields
            .values()
            .flatten()
            .any(|value| matches!(value, Value::Nested(_)))
    }
}

impl Serialize for DeepRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(RESERVED_ID_FIELD, &Value::Id(self.id.clone()))?;
        for (predicate, values) in &self.fields {
            map.serialize_entry(predicate, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DeepRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = DeepRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a record object carrying `{RESERVED_ID_FIELD}`")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut id: Option<Id> = None;
                let mut fields: IndexMap<String, Vec<Value>> = IndexMap::new();

                while let Some(key) = access.next_key::<String>()? {
                    if key == RESERVED_ID_FIELD {
                        match access.next_value::<Value>()? {
                            Value::Id(found) => id = Some(found),
                            _ => {
                                return Err(de::Error::custom(format!(
                                    "`{RESERVED_ID_FIELD}` must be an id value"
                                )));
                            }
                        }
                    } else {
                        fields.insert(key, access.next_value::<Vec<Value>>()?);
                    }
                }

                let id = id.ok_or_else(|| {
                    de::Error::custom(format!("record object is missing `{RESERVED_ID_FIELD}`"))
                })?;
                Ok(DeepRecord { id, fields })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// A complete transport-shaped document: records keyed by resource id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeepSlice(IndexMap<String, DeepRecord>);

impl DeepSlice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its own id, replacing any previous entry.
    pub fn insert(&mut self, record: DeepRecord) -> Option<DeepRecord> {
        self.0.insert(record.id().as_str().to_owned(), record)
    }

    pub fn get(&self, id: &str) -> Option<&DeepRecord> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &DeepRecord> {
        self.0.values()
    }

    pub(crate) fn into_records(self) -> impl DoubleEndedIterator<Item = DeepRecord> {
        self.0.into_values()
    }
}

impl FromIterator<DeepRecord> for DeepSlice {
    fn from_iter<T: IntoIterator<Item = DeepRecord>>(iter: T) -> Self {
        let mut slice = Self::new();
        for record in iter {
            slice.insert(record);
        }
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting_record() -> DeepRecord {
        let mut record = DeepRecord::new(Id::Global("https://example.com/r/1".to_owned()));
        record
            .set_field(
                "https://schema.org/name",
                vec![
                    Value::lang_string("Home", "en"),
                    Value::lang_string("Voorpagina", "nl"),
                ],
            )
            .expect("regular predicate");
        record
    }

    #[test]
    fn record_serializes_with_reserved_id_marker() {
        let record = greeting_record();
        let json = serde_json::to_value(&record).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "_id": {"type": "id", "v": "https://example.com/r/1"},
                "https://schema.org/name": [
                    {"type": "lit", "v": "Home", "lang": "en"},
                    {"type": "lit", "v": "Voorpagina", "lang": "nl"},
                ],
            })
        );
    }

    #[test]
    fn multi_value_lang_strings_survive_round_trip_in_order() {
        let record = greeting_record();
        let json = serde_json::to_string(&record).expect("serializable");
        let back: DeepRecord = serde_json::from_str(&json).expect("deserializable");

        assert_eq!(back, record);
        let values = back
            .field("https://schema.org/name")
            .expect("regular predicate")
            .expect("present");
        assert_eq!(values[0], Value::lang_string("Home", "en"));
        assert_eq!(values[1], Value::lang_string("Voorpagina", "nl"));
    }

    #[test]
    fn record_without_id_is_rejected() {
        let json = serde_json::json!({
            "https://schema.org/name": [{"type": "lit", "v": "Home"}],
        });
        assert!(serde_json::from_value::<DeepRecord>(json).is_err());
    }

    #[test]
    fn reserved_field_access_is_rejected() {
        let mut record = greeting_record();
        assert!(matches!(
            record.field(RESERVED_ID_FIELD),
            Err(DomainError::ReservedField)
        ));
        assert!(matches!(
            record.set_field(RESERVED_ID_FIELD, vec![]),
            Err(DomainError::ReservedField)
        ));
    }

    #[test]
    fn nested_child_is_detected() {
        let child = DeepRecord::new(Id::Local("_:b1".to_owned()));
        let mut parent = greeting_record();
        parent
            .set_field("https://schema.org/author", vec![Value::Nested(child)])
            .expect("regular predicate");
        assert!(parent.has_nested());
        assert!(!greeting_record().has_nested());
    }

    #[test]
    fn slice_keys_follow_record_ids() {
        let mut slice = DeepSlice::new();
        slice.insert(greeting_record());
        assert_eq!(slice.len(), 1);
        assert!(slice.get("https://example.com/r/1").is_some());
    }
}
