//! Specchio keeps a multi-tenant publishing platform's rendered-resource
//! cache consistent with its content store.
//!
//! The crate has three layers:
//!
//! - [`domain`]: the resource data model in deep and storage shape, the
//!   flattener between them, and the mutation taxonomy
//! - [`cache`]: the invalidation worker that consumes the shared mutation
//!   stream and drops stale rendered entries
//! - [`infra`]: Redis adapters and telemetry bootstrap

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
