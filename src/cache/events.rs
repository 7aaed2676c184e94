//! Mutation stream messages.
//!
//! One message per committed mutation, read from the shared transaction
//! stream. Messages are field maps; only a handful of well-known fields
//! matter to invalidation, the rest are carried for logging.

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::domain::{Operation, OperationKind};

/// Field naming the mutated resource IRI.
pub const FIELD_RESOURCE: &str = "resource";
/// Field carrying the qualified operation name.
pub const FIELD_TYPE: &str = "type";
/// Field carrying the class of the mutated resource, when the producer
/// knows it.
pub const FIELD_RESOURCE_TYPE: &str = "resourceType";

/// A single entry read from the mutation stream.
#[derive(Debug, Clone)]
pub struct MutationMessage {
    /// Stream-assigned entry id, used for acknowledgement and diagnostics.
    pub id: String,
    /// Raw field map as the producer wrote it.
    pub fields: HashMap<String, String>,
    /// When this process pulled the entry off the stream.
    pub received_at: OffsetDateTime,
}

impl MutationMessage {
    pub fn new(id: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            fields,
            received_at: OffsetDateTime::now_utc(),
        }
    }

    /// The mutated resource IRI. Empty values count as absent.
    pub fn resource(&self) -> Option<&str> {
        self.fields
            .get(FIELD_RESOURCE)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// The operation name exactly as the producer wrote it.
    pub fn raw_kind(&self) -> Option<&str> {
        self.fields.get(FIELD_TYPE).map(String::as_str)
    }

    /// The recognized operation, if the raw name maps to one.
    pub fn operation_kind(&self) -> Option<OperationKind> {
        self.raw_kind().and_then(OperationKind::parse_qualified)
    }

    /// The resource class, when present.
    pub fn resource_type(&self) -> Option<&str> {
        self.fields
            .get(FIELD_RESOURCE_TYPE)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Assemble the structured operation this message describes, when both
    /// the resource and a recognized kind are present.
    pub fn operation(&self) -> Option<Operation> {
        let kind = self.operation_kind()?;
        let resource = self.resource()?;
        let operation = Operation::new(kind, resource);
        Some(match self.resource_type() {
            Some(resource_type) => operation.with_resource_type(resource_type),
            None => operation,
        })
    }
}
