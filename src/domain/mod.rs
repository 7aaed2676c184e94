//! Resource data model: values, records in deep and storage shape, the
//! flattener between them, and the mutation taxonomy.

pub mod deep;
pub mod error;
pub mod flatten;
pub mod hex;
pub mod record;
pub mod transaction;
pub mod value;

pub use deep::{DeepRecord, DeepSlice};
pub use error::DomainError;
pub use flatten::flatten;
pub use hex::parse_hextuples;
pub use record::{DataSlice, Record, RESERVED_ID_FIELD};
pub use transaction::{Operation, OperationKind, Transaction};
pub use value::{Id, Value};
