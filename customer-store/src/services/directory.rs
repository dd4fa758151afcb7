//! Customer Directory - caller-facing customer operations with query caching
//!
//! Forms are validated here, before anything reaches the store. Reads go
//! through the [`QueryCache`] with retry; every mutation invalidates it.
//! Errors come back as [`AppError`] so callers can tell "validation rejected"
//! (`ValidationFailed`, `CustomerInvalidMobile`) from "not found" (`Ok(None)`
//! or `CustomerNotFound`) from "operation failed" (database / backend codes).

use crate::cache::{CacheKey, CachedValue, QueryCache, with_retry};
use crate::core::Config;
use crate::db::DbService;
use crate::db::id_migration::{IdMigration, MigrationReport};
use crate::db::repository::{CustomerPage, CustomerRepository, PageCursor, RepoError};
use crate::search::{DebouncedSearch, SearchQuery};
use serde::Serialize;
use shared::error::{AppError, AppResult};
use shared::models::{CustomerForm, CustomerRecord, CustomerUpdate};
use std::time::Duration;
use validator::Validate;

/// A listing page as handed to callers; the cursor is an opaque token
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryPage {
    pub customers: Vec<CustomerRecord>,
    pub next_cursor: Option<String>,
}

impl From<CustomerPage> for DirectoryPage {
    fn from(page: CustomerPage) -> Self {
        Self {
            customers: page.records,
            next_cursor: page.next_cursor.as_ref().map(PageCursor::to_token),
        }
    }
}

pub struct CustomerDirectory {
    repo: CustomerRepository,
    migration: IdMigration,
    cache: QueryCache,
    page_size: usize,
    retries: u32,
    search_debounce: Duration,
}

impl CustomerDirectory {
    pub fn new(db: &DbService, config: &Config) -> Self {
        Self {
            repo: db.customers(),
            migration: db.id_migration(),
            cache: QueryCache::new(config.query_stale()),
            page_size: config.page_size,
            retries: config.query_retries,
            search_debounce: config.search_debounce(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Debounce stage for a search box feeding [`page`](Self::page)
    pub fn debounce_search(&self, query: &SearchQuery) -> DebouncedSearch {
        query.debounced(self.search_debounce)
    }

    /// One page of non-deleted customers, optionally filtered by name prefix.
    /// `cursor` is the `next_cursor` token of the previous page.
    pub async fn page(&self, search: &str, cursor: Option<&str>) -> AppResult<DirectoryPage> {
        let key = CacheKey::list(search, cursor.map(str::to_string), self.page_size);
        if let Some(page) = self.cache.page(&key) {
            return Ok(page.into());
        }

        let cursor = cursor.map(PageCursor::from_token).transpose()?;
        let page = with_retry(self.retries, || {
            self.repo
                .list(cursor.as_ref(), self.page_size, search, false)
        })
        .await?;

        self.cache.insert(key, CachedValue::Page(page.clone()));
        Ok(page.into())
    }

    /// Single customer by document id; soft-deleted customers are returned too
    pub async fn customer(&self, id: &str) -> AppResult<Option<CustomerRecord>> {
        if id.is_empty() {
            return Ok(None);
        }
        if let Some(cached) = self.cache.customer(id) {
            return Ok(cached);
        }

        let record = with_retry(self.retries, || self.repo.get(id)).await?;
        self.cache
            .insert(CacheKey::detail(id), CachedValue::Customer(record.clone()));
        Ok(record)
    }

    /// Validate and create; returns the new document id
    pub async fn add(&self, form: CustomerForm) -> AppResult<String> {
        form.validate()?;
        let id = self.repo.create(form).await?;
        self.cache.invalidate_all();
        tracing::info!(id = %id, "Customer added");
        Ok(id)
    }

    /// Validate and merge the present fields into an existing customer
    pub async fn update(&self, id: &str, patch: CustomerUpdate) -> AppResult<()> {
        if patch.customer_id.is_some() {
            return Err(AppError::invalid_request(
                "customer_id is assigned by the store and cannot be edited",
            ));
        }
        patch.validate()?;

        self.repo
            .update(id, patch)
            .await
            .map_err(|e| not_found_as_customer(e, id))?;
        self.cache.invalidate_detail(id);
        self.cache.invalidate_all();
        Ok(())
    }

    /// Soft delete
    pub async fn remove(&self, id: &str) -> AppResult<()> {
        self.repo
            .soft_delete(id)
            .await
            .map_err(|e| not_found_as_customer(e, id))?;
        self.cache.invalidate_all();
        tracing::info!(id, "Customer removed");
        Ok(())
    }

    pub async fn migration_needed(&self) -> AppResult<bool> {
        Ok(self.migration.needs_migration().await?)
    }

    /// Run the id migration. Partial progress survives a failure, so the
    /// cache is dropped either way.
    pub async fn migrate(&self) -> AppResult<MigrationReport> {
        let result = self.migration.run().await;
        self.cache.invalidate_all();
        Ok(result?)
    }
}

fn not_found_as_customer(err: RepoError, id: &str) -> AppError {
    match err {
        RepoError::NotFound(_) => AppError::customer_not_found(id),
        other => other.into(),
    }
}
