use thiserror::Error;

use super::record::RESERVED_ID_FIELD;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("`{RESERVED_ID_FIELD}` is a reserved predicate and cannot be accessed as a field")]
    ReservedField,
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
