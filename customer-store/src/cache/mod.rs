//! Query cache for customer reads
//!
//! List pages and single-customer lookups are cached under [`CacheKey`] and
//! served until they turn stale. Any mutation invalidates every entry, an
//! update additionally drops the detail entry of the edited customer.

use crate::db::repository::CustomerPage;
use dashmap::DashMap;
use shared::models::CustomerRecord;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff before the first retry, doubled per attempt
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One page of a listing; `cursor` is the page's start token
    List {
        search: String,
        cursor: Option<String>,
        page_size: usize,
    },
    /// Single customer by document id
    Detail(String),
}

impl CacheKey {
    pub fn list(search: &str, cursor: Option<String>, page_size: usize) -> Self {
        Self::List {
            search: search.to_string(),
            cursor,
            page_size,
        }
    }

    pub fn detail(id: &str) -> Self {
        Self::Detail(id.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Page(CustomerPage),
    /// `None` caches a confirmed miss
    Customer(Option<CustomerRecord>),
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    stored_at: Instant,
}

pub struct QueryCache {
    entries: DashMap<CacheKey, Entry>,
    stale_after: Duration,
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            stale_after,
        }
    }

    /// Fresh value for `key`; stale entries are evicted on the way
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let fresh = {
            let entry = self.entries.get(key)?;
            (entry.stored_at.elapsed() < self.stale_after).then(|| entry.value.clone())
        };
        if fresh.is_none() {
            self.entries
                .remove_if(key, |_, e| e.stored_at.elapsed() >= self.stale_after);
        }
        fresh
    }

    pub fn insert(&self, key: CacheKey, value: CachedValue) {
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn page(&self, key: &CacheKey) -> Option<CustomerPage> {
        match self.get(key)? {
            CachedValue::Page(page) => Some(page),
            CachedValue::Customer(_) => None,
        }
    }

    pub fn customer(&self, id: &str) -> Option<Option<CustomerRecord>> {
        match self.get(&CacheKey::detail(id))? {
            CachedValue::Customer(record) => Some(record),
            CachedValue::Page(_) => None,
        }
    }

    /// Drop every list and detail entry
    pub fn invalidate_all(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::debug!(dropped, "Query cache invalidated");
    }

    pub fn invalidate_detail(&self, id: &str) {
        self.entries.remove(&CacheKey::detail(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Run `op`, re-invoking it up to `retries` more times while it fails,
/// with exponential backoff between attempts
pub async fn with_retry<T, E, F, Fut>(retries: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                let delay = retry_delay(attempt);
                tracing::warn!(attempt = attempt + 1, retries, error = %e, ?delay, "Query failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(id: &str) -> CustomerRecord {
        CustomerRecord {
            id: id.into(),
            customer_id: "CUST00001".into(),
            name: "Asha".into(),
            address: None,
            gstin: None,
            dl_no: None,
            state_code: None,
            mobile: "9876543210".into(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_turn_stale() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.insert(CacheKey::detail("a"), CachedValue::Customer(Some(record("a"))));
        assert!(cache.customer("a").unwrap().is_some());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.customer("a").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.customer("a").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidation() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let list_key = CacheKey::list("", None, 20);
        cache.insert(list_key.clone(), CachedValue::Page(CustomerPage::default()));
        cache.insert(CacheKey::detail("a"), CachedValue::Customer(Some(record("a"))));
        cache.insert(CacheKey::detail("b"), CachedValue::Customer(None));
        assert_eq!(cache.len(), 3);

        cache.invalidate_detail("a");
        assert!(cache.customer("a").is_none());
        assert_eq!(cache.customer("b"), Some(None));
        assert!(cache.page(&list_key).is_some());

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_keys_distinguish_search_and_cursor() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.insert(CacheKey::list("Jo", None, 20), CachedValue::Page(CustomerPage::default()));
        assert!(cache.page(&CacheKey::list("jo", None, 20)).is_none());
        assert!(cache.page(&CacheKey::list("Jo", Some("t".into()), 20)).is_none());
        assert!(cache.page(&CacheKey::list("Jo", None, 20)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_succeeds_after_failures() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(2, || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(format!("fail {n}")) } else { Ok(n) }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = with_retry(2, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        })
        .await;
        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_delay_is_capped() {
        assert_eq!(retry_delay(0), Duration::from_secs(1));
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(10), RETRY_MAX_DELAY);
    }
}
