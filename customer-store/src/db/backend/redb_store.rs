//! redb-based document backend
//!
//! One table per collection: key = document id, value = JSON-encoded fields.
//! redb calls are blocking, so every operation runs on the blocking pool.

use super::{
    BackendError, BackendResult, Document, DocumentBackend, Fields, MAX_TRANSACTION_WRITES,
    Query, Transaction, TransactionFn, merge_fields, new_document_id, order_documents,
};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError, WriteTransaction};
use std::path::Path;
use std::sync::Arc;

fn table(collection: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(collection)
}

impl From<redb::DatabaseError> for BackendError {
    fn from(err: redb::DatabaseError) -> Self {
        BackendError::Storage(format!("database: {err}"))
    }
}

impl From<redb::TransactionError> for BackendError {
    fn from(err: redb::TransactionError) -> Self {
        BackendError::Storage(format!("transaction: {err}"))
    }
}

impl From<TableError> for BackendError {
    fn from(err: TableError) -> Self {
        BackendError::Storage(format!("table: {err}"))
    }
}

impl From<redb::StorageError> for BackendError {
    fn from(err: redb::StorageError) -> Self {
        BackendError::Storage(format!("storage: {err}"))
    }
}

impl From<redb::CommitError> for BackendError {
    fn from(err: redb::CommitError) -> Self {
        BackendError::Storage(format!("commit: {err}"))
    }
}

/// Persistent backend on an embedded redb file
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackendError::Storage(format!("create {}: {e}", parent.display()))
            })?;
        }
        let db = Database::create(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory database (nothing touches disk)
    pub fn open_in_memory() -> BackendResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> BackendResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| BackendError::Storage(format!("blocking task failed: {e}")))?
    }
}

fn decode(bytes: &[u8]) -> BackendResult<Fields> {
    Ok(serde_json::from_slice(bytes)?)
}

fn read_one(db: &Database, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
    let read_txn = db.begin_read()?;
    let table = match read_txn.open_table(table(collection)) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match table.get(id)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn read_all(db: &Database, collection: &str) -> BackendResult<Vec<Document>> {
    let read_txn = db.begin_read()?;
    let table = match read_txn.open_table(table(collection)) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut docs = Vec::new();
    for entry in table.iter()? {
        let (key, value) = entry?;
        docs.push(Document::new(key.value(), decode(value.value())?));
    }
    Ok(docs)
}

fn write_one(txn: &WriteTransaction, collection: &str, id: &str, fields: &Fields) -> BackendResult<()> {
    let bytes = serde_json::to_vec(fields)?;
    let mut table = txn.open_table(table(collection))?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}

fn get_in(txn: &WriteTransaction, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
    let table = txn.open_table(table(collection))?;
    let value = match table.get(id)? {
        Some(guard) => Some(decode(guard.value())?),
        None => None,
    };
    Ok(value)
}

/// Transaction view over a redb write transaction; writes land directly in
/// the (uncommitted) write transaction, so later reads observe them
struct RedbTransaction<'a> {
    txn: &'a WriteTransaction,
    writes: usize,
}

impl RedbTransaction<'_> {
    fn count_write(&mut self) -> BackendResult<()> {
        self.writes += 1;
        if self.writes > MAX_TRANSACTION_WRITES {
            return Err(BackendError::TransactionTooLarge {
                staged: self.writes,
                limit: MAX_TRANSACTION_WRITES,
            });
        }
        Ok(())
    }
}

impl Transaction for RedbTransaction<'_> {
    fn get(&mut self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        Ok(get_in(self.txn, collection, id)?.map(|fields| Document::new(id, fields)))
    }

    fn set(&mut self, collection: &str, id: &str, fields: Fields) -> BackendResult<()> {
        self.count_write()?;
        write_one(self.txn, collection, id, &fields)
    }

    fn update(&mut self, collection: &str, id: &str, patch: Fields) -> BackendResult<()> {
        let mut fields = get_in(self.txn, collection, id)?
            .ok_or_else(|| BackendError::not_found(collection, id))?;
        self.count_write()?;
        merge_fields(&mut fields, patch);
        write_one(self.txn, collection, id, &fields)
    }

    fn delete(&mut self, collection: &str, id: &str) -> BackendResult<()> {
        self.count_write()?;
        let mut table = self.txn.open_table(table(collection))?;
        table.remove(id)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.blocking(move |db| {
            Ok(read_one(db, &collection, &id)?.map(|fields| Document::new(id, fields)))
        })
        .await
    }

    async fn add(&self, collection: &str, fields: Fields) -> BackendResult<String> {
        let id = new_document_id();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> BackendResult<()> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.blocking(move |db| {
            let txn = db.begin_write()?;
            write_one(&txn, &collection, &id, &fields)?;
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> BackendResult<()> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.blocking(move |db| {
            let txn = db.begin_write()?;
            let mut fields = get_in(&txn, &collection, &id)?
                .ok_or_else(|| BackendError::not_found(&collection, &id))?;
            merge_fields(&mut fields, patch);
            write_one(&txn, &collection, &id, &fields)?;
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.blocking(move |db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(table(&collection))?;
                table.remove(id.as_str())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn query(&self, collection: &str, query: &Query) -> BackendResult<Vec<Document>> {
        let docs = self.scan(collection).await?;
        Ok(order_documents(docs, query))
    }

    async fn scan(&self, collection: &str) -> BackendResult<Vec<Document>> {
        let collection = collection.to_string();
        self.blocking(move |db| read_all(db, &collection)).await
    }

    async fn run_transaction(&self, f: TransactionFn) -> BackendResult<()> {
        self.blocking(move |db| {
            let txn = db.begin_write()?;
            let result = {
                let mut view = RedbTransaction {
                    txn: &txn,
                    writes: 0,
                };
                f(&mut view)
            };
            match result {
                Ok(()) => {
                    txn.commit()?;
                    Ok(())
                }
                Err(e) => {
                    txn.abort()?;
                    Err(e)
                }
            }
        })
        .await
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
    async fn test_missing_collection_reads_empty() {
        let backend = RedbBackend::open_in_memory().unwrap();
        assert!(backend.get("customers", "x").await.unwrap().is_none());
        assert!(backend.scan("customers").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crud_and_query() {
        let backend = RedbBackend::open_in_memory().unwrap();
        let a = backend
            .add("customers", fields(json!({"name": "Bina"})))
            .await
            .unwrap();
        backend
            .add("customers", fields(json!({"name": "Arun"})))
            .await
            .unwrap();

        backend
            .update("customers", &a, fields(json!({"mobile": "9000000000"})))
            .await
            .unwrap();
        let doc = backend.get("customers", &a).await.unwrap().unwrap();
        assert_eq!(doc.get("name").unwrap(), "Bina");
        assert_eq!(doc.get("mobile").unwrap(), "9000000000");

        let docs = backend
            .query("customers", &Query::order_by("name", Direction::Asc))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get("name").unwrap(), "Arun");

        backend.delete("customers", &a).await.unwrap();
        assert_eq!(backend.scan("customers").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let backend = RedbBackend::open_in_memory().unwrap();
        let err = backend
            .update("customers", "ghost", fields(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_transaction_rollback_and_commit() {
        let backend = RedbBackend::open_in_memory().unwrap();

        let result = backend
            .run_transaction(Box::new(|txn| {
                txn.set("customers", "a", fields(json!({"name": "A"})))?;
                Err(BackendError::Aborted("stop".into()))
            }))
            .await;
        assert!(result.is_err());
        assert!(backend.get("customers", "a").await.unwrap().is_none());

        let seen = transact(&backend, |txn| {
            txn.set("customers", "a", fields(json!({"name": "A"})))?;
            Ok(txn.get("customers", "a")?.is_some())
        })
        .await
        .unwrap();
        assert!(seen);
        assert!(backend.get("customers", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transaction_write_limit() {
        let backend = RedbBackend::open_in_memory().unwrap();
        let result = backend
            .run_transaction(Box::new(|txn| {
                for i in 0..=MAX_TRANSACTION_WRITES {
                    txn.set("customers", &format!("{i}"), Fields::new())?;
                }
                Ok(())
            }))
            .await;
        assert!(matches!(
            result,
            Err(BackendError::TransactionTooLarge { .. })
        ));
        assert!(backend.scan("customers").await.unwrap().is_empty());
    }
}
