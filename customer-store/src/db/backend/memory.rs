//! In-memory document backend
//!
//! Transactions hold the write lock for their whole (synchronous) body and
//! apply staged writes only on success, which gives the same all-or-nothing
//! behaviour as the persistent backend. Fault injection hooks let tests
//! simulate a backend that drops mid-migration or flakes on reads.

use super::{
    BackendError, BackendResult, Document, DocumentBackend, Fields, MAX_TRANSACTION_WRITES,
    Query, Transaction, TransactionFn, merge_fields, new_document_id, order_documents,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

#[derive(Debug, Default)]
struct FaultPlan {
    /// Remaining successful commits before every transaction fails
    commits_before_failure: Option<usize>,
    /// Number of upcoming reads that fail
    read_failures: usize,
}

#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<Collections>,
    faults: Mutex<FaultPlan>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `commits` more transactions succeed, then fail every following one
    pub fn fail_transactions_after(&self, commits: usize) {
        self.faults.lock().commits_before_failure = Some(commits);
    }

    /// Fail the next `count` reads (`get`, `query`, `scan`)
    pub fn fail_next_reads(&self, count: usize) {
        self.faults.lock().read_failures = count;
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = FaultPlan::default();
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn check_read(&self) -> BackendResult<()> {
        let mut faults = self.faults.lock();
        if faults.read_failures > 0 {
            faults.read_failures -= 1;
            return Err(BackendError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    fn check_commit(&self) -> BackendResult<()> {
        match self.faults.lock().commits_before_failure {
            Some(0) => Err(BackendError::Unavailable(
                "injected transaction failure".into(),
            )),
            _ => Ok(()),
        }
    }

    fn record_commit(&self) {
        if let Some(remaining) = self.faults.lock().commits_before_failure.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

struct MemoryTransaction<'a> {
    data: &'a Collections,
    staged: BTreeMap<(String, String), Option<Fields>>,
    writes: usize,
}

impl<'a> MemoryTransaction<'a> {
    fn new(data: &'a Collections) -> Self {
        Self {
            data,
            staged: BTreeMap::new(),
            writes: 0,
        }
    }

    fn current(&self, collection: &str, id: &str) -> Option<Fields> {
        match self.staged.get(&(collection.to_string(), id.to_string())) {
            Some(staged) => staged.clone(),
            None => self
                .data
                .get(collection)
                .and_then(|docs| docs.get(id))
                .cloned(),
        }
    }

    fn stage(&mut self, collection: &str, id: &str, value: Option<Fields>) -> BackendResult<()> {
        self.writes += 1;
        if self.writes > MAX_TRANSACTION_WRITES {
            return Err(BackendError::TransactionTooLarge {
                staged: self.writes,
                limit: MAX_TRANSACTION_WRITES,
            });
        }
        self.staged
            .insert((collection.to_string(), id.to_string()), value);
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        Ok(self
            .current(collection, id)
            .map(|fields| Document::new(id, fields)))
    }

    fn set(&mut self, collection: &str, id: &str, fields: Fields) -> BackendResult<()> {
        self.stage(collection, id, Some(fields))
    }

    fn update(&mut self, collection: &str, id: &str, patch: Fields) -> BackendResult<()> {
        let mut fields = self
            .current(collection, id)
            .ok_or_else(|| BackendError::not_found(collection, id))?;
        merge_fields(&mut fields, patch);
        self.stage(collection, id, Some(fields))
    }

    fn delete(&mut self, collection: &str, id: &str) -> BackendResult<()> {
        self.stage(collection, id, None)
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        self.check_read()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn add(&self, collection: &str, fields: Fields) -> BackendResult<String> {
        let id = new_document_id();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> BackendResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> BackendResult<()> {
        let mut collections = self.collections.write();
        let fields = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| BackendError::not_found(collection, id))?;
        merge_fields(fields, patch);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()> {
        if let Some(docs) = self.collections.write().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> BackendResult<Vec<Document>> {
        let docs = self.scan(collection).await?;
        Ok(order_documents(docs, query))
    }

    async fn scan(&self, collection: &str) -> BackendResult<Vec<Document>> {
        self.check_read()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn run_transaction(&self, f: TransactionFn) -> BackendResult<()> {
        self.check_commit()?;

        let mut collections = self.collections.write();
        let staged = {
            let mut txn = MemoryTransaction::new(&collections);
            f(&mut txn)?;
            txn.staged
        };
        for ((collection, id), value) in staged {
            let docs = collections.entry(collection).or_default();
            match value {
                Some(fields) => {
                    docs.insert(id, fields);
                }
                None => {
                    docs.remove(&id);
                }
            }
        }
        drop(collections);

        self.record_commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::backend::{Direction, transact};
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_crud() {
        let backend = MemoryBackend::new();
        let id = backend
            .add("customers", fields(json!({"name": "Asha"})))
            .await
            .unwrap();

        let doc = backend.get("customers", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("name").unwrap(), "Asha");

        backend
            .update("customers", &id, fields(json!({"mobile": "9876543210"})))
            .await
            .unwrap();
        let doc = backend.get("customers", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("name").unwrap(), "Asha");
        assert_eq!(doc.get("mobile").unwrap(), "9876543210");

        backend.delete("customers", &id).await.unwrap();
        assert!(backend.get("customers", &id).await.unwrap().is_none());
        // Deleting twice is fine
        backend.delete("customers", &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let backend = MemoryBackend::new();
        let err = backend
            .update("customers", "nope", fields(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_transaction_commits_atomically() {
        let backend = MemoryBackend::new();
        backend
            .set("counters", "c", fields(json!({"count": 1})))
            .await
            .unwrap();

        let value = transact(&backend, |txn| {
            let current = txn
                .get("counters", "c")?
                .and_then(|d| d.get("count").and_then(|v| v.as_u64()))
                .unwrap_or(0);
            txn.set("counters", "c", fields(json!({"count": current + 1})))?;
            // Reads see staged writes
            let staged = txn.get("counters", "c")?.unwrap();
            assert_eq!(staged.get("count").unwrap(), 2);
            Ok(current + 1)
        })
        .await
        .unwrap();
        assert_eq!(value, 2);

        let doc = backend.get("counters", "c").await.unwrap().unwrap();
        assert_eq!(doc.get("count").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_transaction_writes_nothing() {
        let backend = MemoryBackend::new();
        let result = backend
            .run_transaction(Box::new(|txn| {
                txn.set("customers", "a", fields(json!({"name": "A"})))?;
                txn.update("customers", "missing", fields(json!({"name": "B"})))
            }))
            .await;
        assert!(result.is_err());
        assert_eq!(backend.len("customers"), 0);
    }

    #[tokio::test]
    async fn test_transaction_write_limit() {
        let backend = MemoryBackend::new();
        let result = backend
            .run_transaction(Box::new(|txn| {
                for i in 0..=MAX_TRANSACTION_WRITES {
                    txn.set("customers", &i.to_string(), Fields::new())?;
                }
                Ok(())
            }))
            .await;
        assert!(matches!(
            result,
            Err(BackendError::TransactionTooLarge { .. })
        ));
        assert_eq!(backend.len("customers"), 0);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = MemoryBackend::new();
        backend.fail_transactions_after(1);
        assert!(backend.run_transaction(Box::new(|_| Ok(()))).await.is_ok());
        assert!(backend.run_transaction(Box::new(|_| Ok(()))).await.is_err());
        backend.clear_faults();
        assert!(backend.run_transaction(Box::new(|_| Ok(()))).await.is_ok());

        backend.fail_next_reads(1);
        assert!(backend.scan("customers").await.is_err());
        assert!(backend.scan("customers").await.is_ok());
    }

    #[tokio::test]
    async fn test_query() {
        let backend = MemoryBackend::new();
        for name in ["Carol", "Alice", "Bob"] {
            backend
                .add("customers", fields(json!({ "name": name })))
                .await
                .unwrap();
        }
        let docs = backend
            .query("customers", &Query::order_by("name", Direction::Asc).limit(2))
            .await
            .unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.get("name").unwrap().clone()).collect();
        assert_eq!(names, vec![json!("Alice"), json!("Bob")]);
    }
}
