//! Database Module
//!
//! Opens the configured document backend and hands out the stores built on it

pub mod backend;
pub mod id_migration;
pub mod repository;

use crate::core::{BackendKind, Config};
use crate::utils::AppError;
use backend::{DocumentBackend, MemoryBackend, RedbBackend};
use id_migration::IdMigration;
use repository::CustomerRepository;
use std::sync::Arc;

/// Database service: owns the document backend
#[derive(Clone)]
pub struct DbService {
    backend: Arc<dyn DocumentBackend>,
    migration_lock_ttl: std::time::Duration,
}

impl DbService {
    /// Open the backend selected by `config`
    pub fn open(config: &Config) -> Result<Self, AppError> {
        let backend: Arc<dyn DocumentBackend> = match config.backend {
            BackendKind::Redb => {
                let db = RedbBackend::open(&config.store_path).map_err(|e| {
                    AppError::database(format!("Failed to open {}: {e}", config.store_path))
                })?;
                tracing::info!(path = %config.store_path, "Database opened (redb)");
                Arc::new(db)
            }
            BackendKind::Memory => {
                tracing::warn!("Using in-memory store, data is lost on exit");
                Arc::new(MemoryBackend::new())
            }
        };
        Ok(Self::with_backend(backend, config))
    }

    /// Wrap an already constructed backend
    pub fn with_backend(backend: Arc<dyn DocumentBackend>, config: &Config) -> Self {
        Self {
            backend,
            migration_lock_ttl: config.migration_lock_ttl(),
        }
    }

    pub fn backend(&self) -> Arc<dyn DocumentBackend> {
        Arc::clone(&self.backend)
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.backend())
    }

    /// Migration guarded by the application-level lock
    pub fn id_migration(&self) -> IdMigration {
        IdMigration::new(self.customers()).with_lock(self.migration_lock_ttl)
    }
}
