//! Document backend
//!
//! The customer store talks to its persistence through [`DocumentBackend`]:
//! collections of JSON documents addressed by an opaque id, with ordered range
//! queries, cursor pagination and multi-document atomic transactions.
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`MemoryBackend`] | tests, ephemeral sessions, fault injection |
//! | [`RedbBackend`] | embedded persistent store (`redb`) |

mod memory;
mod query;
mod redb_store;

pub use self::memory::MemoryBackend;
pub use self::query::{Direction, Query, QueryCursor, compare_values, order_documents};
pub use self::redb_store::RedbBackend;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Document body: top-level field name → JSON value
pub type Fields = Map<String, Value>;

/// Upper bound on writes staged by one transaction
pub const MAX_TRANSACTION_WRITES: usize = 500;

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Transaction staged {staged} writes, limit is {limit}")]
    TransactionTooLarge { staged: usize, limit: usize },

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BackendError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Synchronous view of one atomic transaction
///
/// Reads observe writes staged earlier in the same transaction. Nothing is
/// visible to other readers until the transaction commits.
pub trait Transaction {
    fn get(&mut self, collection: &str, id: &str) -> BackendResult<Option<Document>>;

    /// Create or replace a document
    fn set(&mut self, collection: &str, id: &str, fields: Fields) -> BackendResult<()>;

    /// Merge `patch` into an existing document; `NotFound` if absent
    fn update(&mut self, collection: &str, id: &str, patch: Fields) -> BackendResult<()>;

    fn delete(&mut self, collection: &str, id: &str) -> BackendResult<()>;
}

/// Closure run inside a backend transaction
pub type TransactionFn = Box<dyn FnOnce(&mut dyn Transaction) -> BackendResult<()> + Send>;

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>>;

    /// Insert with a backend-assigned id, returns the id
    async fn add(&self, collection: &str, fields: Fields) -> BackendResult<String>;

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> BackendResult<()>;

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> BackendResult<()>;

    /// Remove a document; removing an absent document succeeds
    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()>;

    async fn query(&self, collection: &str, query: &Query) -> BackendResult<Vec<Document>>;

    /// Every document of the collection, in id order
    async fn scan(&self, collection: &str) -> BackendResult<Vec<Document>>;

    /// Run `f` atomically: either every staged write commits or none does
    async fn run_transaction(&self, f: TransactionFn) -> BackendResult<()>;
}

/// Run a transaction that produces a value
pub async fn transact<T, F>(backend: &dyn DocumentBackend, f: F) -> BackendResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn Transaction) -> BackendResult<T> + Send + 'static,
{
    let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let out = Arc::clone(&slot);
    backend
        .run_transaction(Box::new(move |txn| {
            let value = f(txn)?;
            *out.lock() = Some(value);
            Ok(())
        }))
        .await?;
    let value = slot.lock().take();
    value.ok_or_else(|| BackendError::Aborted("transaction produced no result".into()))
}

/// Backend-assigned document id (uuid v4, simple form)
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Top-level field merge used by every `update`
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}
