//! Data models
//!
//! Shared between the customer store and its callers. Records are persisted
//! as JSON documents; the backend document id travels in `id`.

pub mod customer;

// Re-exports
pub use customer::*;
