//! One-time customer_id migration: renumber legacy `CUST_…` ids to `CUST00042`.
//!
//! Targets are processed in batches of [`MIGRATION_BATCH_SIZE`], each batch in
//! one backend transaction together with the counter write. A failed batch
//! leaves earlier batches committed; re-running resumes with whatever legacy
//! records remain, since migrated records no longer carry the legacy prefix.
//!
//! Counter document: `counters/customer_counter`, field `count`, holding the last
//! sequential number issued. It never decreases.

use crate::db::backend::{
    BackendError, Document, DocumentBackend, Fields, Transaction, new_document_id, transact,
};
use crate::db::repository::customer::CUSTOMERS;
use crate::db::repository::{CustomerRepository, RepoError};
use crate::utils::logger::MIGRATION_TARGET;
use serde::Serialize;
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::{is_legacy_customer_id, sequential_customer_id};
use std::time::Duration;
use thiserror::Error;

/// Records per transaction; the backend allows 500 writes, one goes to the counter
pub const MIGRATION_BATCH_SIZE: usize = 400;

pub const COUNTERS: &str = "counters";
pub const COUNTER_DOC: &str = "customer_counter";
pub const LOCK_DOC: &str = "migration_lock";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to load customers: {0}")]
    Load(#[from] RepoError),

    #[error("Batch {batch} failed after {migrated} records were migrated: {source}")]
    Batch {
        batch: usize,
        migrated: usize,
        #[source]
        source: BackendError,
    },

    #[error("Migration already running (holder {holder})")]
    Locked { holder: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        match &err {
            MigrationError::Locked { holder } => {
                AppError::new(ErrorCode::MigrationInProgress).with_detail("holder", holder.clone())
            }
            MigrationError::Batch { batch, migrated, .. } => {
                AppError::migration_failed(err.to_string())
                    .with_detail("batch", *batch)
                    .with_detail("migrated", *migrated)
            }
            _ => AppError::migration_failed(err.to_string()),
        }
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Records rewritten by this run
    pub migrated: usize,
    /// Batches committed by this run
    pub batches: usize,
    /// Counter value after the last committed batch; `None` for a no-op run
    pub last_issued: Option<u64>,
}

/// Legacy → sequential `customer_id` migration
#[derive(Clone)]
pub struct IdMigration {
    repo: CustomerRepository,
    lock_ttl: Option<Duration>,
}

impl IdMigration {
    pub fn new(repo: CustomerRepository) -> Self {
        Self {
            repo,
            lock_ttl: None,
        }
    }

    /// Guard each run with the `counters/migration_lock` document. A lock
    /// older than `ttl` is considered abandoned and may be taken over.
    pub fn with_lock(mut self, ttl: Duration) -> Self {
        self.lock_ttl = Some(ttl);
        self
    }

    fn backend(&self) -> &dyn DocumentBackend {
        self.repo.backend().as_ref()
    }

    /// True when any document, soft-deleted or malformed ones included,
    /// still has a legacy id
    pub async fn needs_migration(&self) -> MigrationResult<bool> {
        let docs = self.load_customers().await?;
        Ok(docs.iter().any(has_legacy_id))
    }

    /// Last issued sequential number (0 before the first run)
    pub async fn current_counter(&self) -> MigrationResult<u64> {
        let doc = self.backend().get(COUNTERS, COUNTER_DOC).await?;
        Ok(doc.as_ref().map(|d| counter_value(&d.fields)).unwrap_or(0))
    }

    /// Migrate every legacy record. Safe to call again after a failure.
    pub async fn run(&self) -> MigrationResult<MigrationReport> {
        let Some(ttl) = self.lock_ttl else {
            return self.migrate().await;
        };

        let holder = self.acquire_lock(ttl).await.inspect_err(|e| {
            tracing::error!(target: MIGRATION_TARGET, error = %e, "Could not acquire migration lock");
        })?;
        let result = self.migrate().await;
        if let Err(e) = self.release_lock(&holder).await {
            tracing::warn!(holder = %holder, error = %e, "Failed to release migration lock");
        }
        result
    }

    async fn migrate(&self) -> MigrationResult<MigrationReport> {
        let docs = self.load_customers().await?;
        let targets: Vec<String> = docs
            .iter()
            .filter(|doc| has_legacy_id(doc))
            .map(|doc| doc.id.clone())
            .collect();

        if targets.is_empty() {
            tracing::info!("No customers to migrate");
            return Ok(MigrationReport::default());
        }

        let counter = self.current_counter().await.inspect_err(|e| {
            tracing::error!(target: MIGRATION_TARGET, error = %e, "Failed to read migration counter");
        })?;
        // Start above the document count as well, so numbers below it stay free
        let mut running = counter.max(docs.len() as u64);
        let mut report = MigrationReport::default();

        tracing::info!(
            target: MIGRATION_TARGET,
            targets = targets.len(),
            counter,
            start = running,
            "Starting customer_id migration"
        );

        for (index, batch) in targets.chunks(MIGRATION_BATCH_SIZE).enumerate() {
            let (next, migrated) = self
                .migrate_batch(batch.to_vec(), running)
                .await
                .map_err(|source| {
                    tracing::error!(
                        target: MIGRATION_TARGET,
                        batch = index + 1,
                        migrated = report.migrated,
                        error = %source,
                        "Migration batch failed"
                    );
                    MigrationError::Batch {
                        batch: index + 1,
                        migrated: report.migrated,
                        source,
                    }
                })?;

            running = next;
            report.migrated += migrated;
            report.batches += 1;
            report.last_issued = Some(running);
            tracing::info!(
                target: MIGRATION_TARGET,
                batch = index + 1,
                migrated,
                counter = running,
                "Migrated batch"
            );
        }

        tracing::info!(
            target: MIGRATION_TARGET,
            migrated = report.migrated,
            batches = report.batches,
            "Successfully migrated customers"
        );
        Ok(report)
    }

    /// Every raw document of the collection, in document id order. Documents
    /// that do not decode as customers still count towards the total.
    async fn load_customers(&self) -> MigrationResult<Vec<Document>> {
        self.backend().scan(CUSTOMERS).await.map_err(|e| {
            tracing::error!(target: MIGRATION_TARGET, error = %e, "Failed to load customers");
            MigrationError::Load(RepoError::from(e))
        })
    }

    /// One atomic batch. Re-reads the counter and every target inside the
    /// transaction: a target that is gone or no longer legacy is skipped.
    /// Returns the counter after the batch and the number of rewritten records.
    async fn migrate_batch(&self, ids: Vec<String>, running: u64) -> Result<(u64, usize), BackendError> {
        transact(self.backend(), move |txn| {
            let stored = read_counter(txn)?;
            let mut next = stored.max(running);
            let mut migrated = 0;

            for id in &ids {
                let Some(doc) = txn.get(CUSTOMERS, id)? else {
                    continue;
                };
                if !has_legacy_id(&doc) {
                    continue;
                }

                next += 1;
                let mut patch = Fields::new();
                patch.insert("customer_id".into(), sequential_customer_id(next).into());
                txn.update(CUSTOMERS, id, patch)?;
                migrated += 1;
            }

            txn.set(COUNTERS, COUNTER_DOC, counter_fields(next))?;
            Ok((next, migrated))
        })
        .await
    }

    async fn acquire_lock(&self, ttl: Duration) -> MigrationResult<String> {
        let holder = new_document_id();
        let ours = holder.clone();
        let now = shared::util::now_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        let blocked_by = transact(self.backend(), move |txn| {
            if let Some(doc) = txn.get(COUNTERS, LOCK_DOC)? {
                let held_by = doc
                    .get("holder")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let acquired_at = doc.get("acquired_at").and_then(Value::as_i64).unwrap_or(0);
                if now.saturating_sub(acquired_at) < ttl_ms {
                    return Ok(Some(held_by));
                }
                tracing::warn!(holder = %held_by, acquired_at, "Taking over stale migration lock");
            }
            let mut fields = Fields::new();
            fields.insert("holder".into(), ours.into());
            fields.insert("acquired_at".into(), now.into());
            txn.set(COUNTERS, LOCK_DOC, fields)?;
            Ok(None)
        })
        .await?;

        match blocked_by {
            Some(holder) => Err(MigrationError::Locked { holder }),
            None => {
                tracing::debug!(holder = %holder, "Migration lock acquired");
                Ok(holder)
            }
        }
    }

    async fn release_lock(&self, holder: &str) -> MigrationResult<()> {
        let ours = holder.to_string();
        transact(self.backend(), move |txn| {
            let held = txn
                .get(COUNTERS, LOCK_DOC)?
                .is_some_and(|doc| doc.get("holder").and_then(Value::as_str) == Some(ours.as_str()));
            if held {
                txn.delete(COUNTERS, LOCK_DOC)?;
            }
            Ok(())
        })
        .await?;
        Ok(())
    }
}

fn has_legacy_id(doc: &Document) -> bool {
    doc.get("customer_id")
        .and_then(Value::as_str)
        .is_some_and(is_legacy_customer_id)
}

fn counter_value(fields: &Fields) -> u64 {
    fields.get("count").and_then(Value::as_u64).unwrap_or(0)
}

fn counter_fields(count: u64) -> Fields {
    match json!({ "count": count }) {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn read_counter(txn: &mut dyn Transaction) -> Result<u64, BackendError> {
    Ok(txn
        .get(COUNTERS, COUNTER_DOC)?
        .map(|doc| counter_value(&doc.fields))
        .unwrap_or(0))
}
