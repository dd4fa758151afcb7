//! Customer Repository
//!
//! CRUD, cursor pagination and prefix search over the `customers` collection.
//! Soft-deleted records are filtered client-side: a listing over-fetches
//! `2 × page_size` raw documents and drops the deleted ones, so a page may
//! hold fewer than `page_size` records while more exist further down.
//! Callers enumerate by following `next_cursor` until it is `None`.

use super::{RepoError, RepoResult};
use crate::db::backend::{Direction, Document, DocumentBackend, Fields, Query, QueryCursor};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{CustomerForm, CustomerRecord, CustomerUpdate, generate_customer_id};
use std::sync::Arc;

pub const CUSTOMERS: &str = "customers";

/// Upper bound of a name prefix range (private-use code point, sorts after
/// every character a customer name realistically contains)
const PREFIX_SENTINEL: char = '\u{f8ff}';

/// Opaque pagination cursor: the last raw record a page consumed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(rename = "f")]
    order_by: String,
    #[serde(rename = "v")]
    value: Value,
    #[serde(rename = "i")]
    id: String,
}

impl PageCursor {
    fn from_document(doc: &Document, field: &str) -> Option<Self> {
        QueryCursor::from_document(doc, field).map(|c| Self {
            order_by: field.to_string(),
            value: c.value,
            id: c.id,
        })
    }

    fn query_cursor(&self) -> QueryCursor {
        QueryCursor {
            value: self.value.clone(),
            id: self.id.clone(),
        }
    }

    /// Document id the cursor sits on
    pub fn document_id(&self) -> &str {
        &self.id
    }

    /// Encode as URL-safe text
    pub fn to_token(&self) -> String {
        // Serializing a struct of strings and a JSON value cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn from_token(token: &str) -> RepoResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| RepoError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RepoError::InvalidCursor(e.to_string()))
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct CustomerPage {
    pub records: Vec<CustomerRecord>,
    pub next_cursor: Option<PageCursor>,
}

#[derive(Clone)]
pub struct CustomerRepository {
    backend: Arc<dyn DocumentBackend>,
}

impl CustomerRepository {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    /// Persist a new customer with a fresh `CUST-<millis>-<suffix>` id.
    /// Returns the backend document id.
    pub async fn create(&self, form: CustomerForm) -> RepoResult<String> {
        let record = CustomerRecord {
            id: String::new(),
            customer_id: generate_customer_id(),
            name: form.name,
            address: form.address,
            gstin: form.gstin,
            dl_no: form.dl_no,
            state_code: form.state_code,
            mobile: form.mobile,
            created_at: Some(shared::util::now_utc()),
            updated_at: None,
            deleted_at: None,
        };
        let fields = encode_record(&record)?;

        match self.backend.add(CUSTOMERS, fields).await {
            Ok(id) => {
                tracing::debug!(id = %id, customer_id = %record.customer_id, "Customer created");
                Ok(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error adding customer");
                Err(e.into())
            }
        }
    }

    /// Direct lookup; soft-deleted records are returned too
    pub async fn get(&self, id: &str) -> RepoResult<Option<CustomerRecord>> {
        let doc = self.backend.get(CUSTOMERS, id).await.map_err(|e| {
            tracing::error!(id, error = %e, "Error getting customer");
            RepoError::from(e)
        })?;
        doc.map(decode_record).transpose()
    }

    /// One page ordered by `customer_id` descending, or by `name` ascending
    /// restricted to names starting with `search` (case-sensitive)
    pub async fn list(
        &self,
        cursor: Option<&PageCursor>,
        page_size: usize,
        search: &str,
        include_deleted: bool,
    ) -> RepoResult<CustomerPage> {
        if page_size == 0 {
            return Ok(CustomerPage::default());
        }

        let fetch = if include_deleted {
            page_size
        } else {
            page_size.saturating_mul(2)
        };

        let mut query = if search.is_empty() {
            Query::order_by("customer_id", Direction::Desc)
        } else {
            Query::order_by("name", Direction::Asc)
                .start_at(search)
                .end_at(format!("{search}{PREFIX_SENTINEL}"))
        };
        if let Some(cursor) = cursor {
            if cursor.order_by != query.order_by {
                return Err(RepoError::InvalidCursor(format!(
                    "cursor ordered by '{}' used on a listing ordered by '{}'",
                    cursor.order_by, query.order_by
                )));
            }
            query = query.start_after(Some(cursor.query_cursor()));
        }
        let query = query.limit(fetch);

        let raw = self.backend.query(CUSTOMERS, &query).await.map_err(|e| {
            tracing::error!(search, error = %e, "Error getting customers");
            RepoError::from(e)
        })?;

        let mut records = Vec::with_capacity(page_size);
        let mut consumed = 0;
        for doc in &raw {
            consumed += 1;
            match decode_record(doc.clone()) {
                Ok(record) if include_deleted || !record.is_deleted() => {
                    records.push(record);
                    if records.len() == page_size {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(id = %doc.id, error = %e, "Skipping malformed customer"),
            }
        }

        let exhausted = consumed == raw.len() && raw.len() < fetch;
        let next_cursor = if exhausted {
            None
        } else {
            raw.get(consumed.saturating_sub(1))
                .and_then(|doc| PageCursor::from_document(doc, &query.order_by))
        };

        Ok(CustomerPage {
            records,
            next_cursor,
        })
    }

    /// Merge the present fields of `patch`, stamping `updated_at`.
    /// Fails with `NotFound` when the record does not exist.
    pub async fn update(&self, id: &str, patch: CustomerUpdate) -> RepoResult<()> {
        let mut fields = match serde_json::to_value(&patch)? {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        fields.insert("updated_at".into(), serde_json::to_value(shared::util::now_utc())?);

        self.backend.update(CUSTOMERS, id, fields).await.map_err(|e| {
            tracing::error!(id, error = %e, "Error updating customer");
            RepoError::from(e)
        })
    }

    /// Stamp `deleted_at`; the record stays readable by id
    pub async fn soft_delete(&self, id: &str) -> RepoResult<()> {
        let mut fields = Fields::new();
        fields.insert("deleted_at".into(), serde_json::to_value(shared::util::now_utc())?);

        self.backend.update(CUSTOMERS, id, fields).await.map_err(|e| {
            tracing::error!(id, error = %e, "Error soft deleting customer");
            RepoError::from(e)
        })
    }

    /// Permanently remove a record; removing an absent record succeeds
    pub async fn hard_delete(&self, id: &str) -> RepoResult<()> {
        self.backend.delete(CUSTOMERS, id).await.map_err(|e| {
            tracing::error!(id, error = %e, "Error deleting customer");
            RepoError::from(e)
        })
    }

    /// Unpaginated full scan. O(collection); keep it out of interactive paths.
    pub async fn list_all(&self, include_deleted: bool) -> RepoResult<Vec<CustomerRecord>> {
        let docs = self.backend.scan(CUSTOMERS).await.map_err(|e| {
            tracing::error!(error = %e, "Error getting customers");
            RepoError::from(e)
        })?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id.clone();
            match decode_record(doc) {
                Ok(record) if include_deleted || !record.is_deleted() => records.push(record),
                Ok(_) => {}
                Err(e) => tracing::warn!(id = %id, error = %e, "Skipping malformed customer"),
            }
        }
        Ok(records)
    }

    pub async fn count(&self, include_deleted: bool) -> RepoResult<usize> {
        Ok(self.list_all(include_deleted).await?.len())
    }

    /// Hard-delete every record. Returns how many were removed.
    pub async fn clear(&self) -> RepoResult<usize> {
        let docs = self.backend.scan(CUSTOMERS).await.map_err(|e| {
            tracing::error!(error = %e, "Error clearing customers");
            RepoError::from(e)
        })?;
        futures::future::try_join_all(docs.iter().map(|doc| self.hard_delete(&doc.id))).await?;
        tracing::info!(removed = docs.len(), "Customers cleared");
        Ok(docs.len())
    }
}

fn encode_record(record: &CustomerRecord) -> RepoResult<Fields> {
    let mut fields = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        _ => return Err(RepoError::Database("customer did not encode as an object".into())),
    };
    // The document id lives outside the body
    fields.remove("id");
    Ok(fields)
}

fn decode_record(doc: Document) -> RepoResult<CustomerRecord> {
    let mut record: CustomerRecord = serde_json::from_value(Value::Object(doc.fields))?;
    record.id = doc.id;
    Ok(record)
}
