//! Mutation taxonomy emitted by the upstream content system.

use std::collections::HashSet;

/// The kinds of mutation the upstream store reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Created,
    Updated,
    Converted,
    Moved,
    Published,
    Unpublished,
    Deleted,
}

impl OperationKind {
    /// Parse the fully-qualified kind name carried on the wire
    /// (e.g. `io.example.transactions.Updated`) by its final segment.
    pub fn parse_qualified(raw: &str) -> Option<Self> {
        let name = raw.rsplit(['.', '/', '#']).next().unwrap_or(raw);
        match name {
            "Created" => Some(Self::Created),
            "Updated" => Some(Self::Updated),
            "Converted" => Some(Self::Converted),
            "Moved" => Some(Self::Moved),
            "Published" => Some(Self::Published),
            "Unpublished" => Some(Self::Unpublished),
            "Deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Converted => "Converted",
            Self::Moved => "Moved",
            Self::Published => "Published",
            Self::Unpublished => "Unpublished",
            Self::Deleted => "Deleted",
        }
    }
}

/// One mutation of one resource. Operations are not ordered or causally
/// linked within a transaction; each must be independently processable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub kind: OperationKind,
    pub resource: String,
    pub resource_type: Option<String>,
}

impl Operation {
    pub fn new(kind: OperationKind, resource: impl Into<String>) -> Self {
        Self {
            kind,
            resource: resource.into(),
            resource_type: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

/// A set of operations reported together. Unique by value, no defined order.
pub type Transaction = HashSet<Operation>;
