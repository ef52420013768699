//! Request-scoped cache
//!
//! One instance is created per inbound GraphQL request and passed down the
//! call chain; it is dropped with the request. Each key maps to a `OnceCell`,
//! which gives both layers in one structure: the resolved value, and
//! in-flight deduplication (concurrent callers for the same key within one
//! request share a single outbound call). Failed fetches are not memoized, so
//! a later caller may retry. There is no cross-request sharing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};

use crate::errors::Result;

#[derive(Default)]
pub struct RequestCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<Value>>>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn cell(&self, key: &str) -> Arc<OnceCell<Value>> {
        let mut cells = self.cells.lock().await;
        Arc::clone(cells.entry(key.to_string()).or_default())
    }

    /// Returns the cached value for `key`, or runs `fetch` exactly once even
    /// under concurrent callers and caches its success.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let cell = self.cell(key).await;
        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Drops a single key; the next `get_or_fetch` refetches.
    pub async fn invalidate(&self, key: &str) {
        self.cells.lock().await.remove(key);
    }

    /// Drops every key starting with `prefix` (used after structural sheet
    /// changes that make all cached metadata stale).
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.cells.lock().await.retain(|k, _| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DomainError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let cache = RequestCache::new();
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!("v"))
        };
        let (a, b) = tokio::join!(
            cache.get_or_fetch("k", fetch),
            cache.get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("v"))
            })
        );
        assert_eq!(a.unwrap(), json!("v"));
        assert_eq!(b.unwrap(), json!("v"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_memoized() {
        let cache = RequestCache::new();
        let first = cache
            .get_or_fetch("k", || async { Err(DomainError::Io("boom".into())) })
            .await;
        assert!(first.is_err());

        let second = cache.get_or_fetch("k", || async { Ok(json!(1)) }).await;
        assert_eq!(second.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn invalidate_prefix_refetches() {
        let cache = RequestCache::new();
        cache
            .get_or_fetch("meta:sheet:Master", || async { Ok(json!(7)) })
            .await
            .unwrap();
        cache.invalidate_prefix("meta:").await;

        let after = cache
            .get_or_fetch("meta:sheet:Master", || async { Ok(json!(8)) })
            .await
            .unwrap();
        assert_eq!(after, json!(8));
    }
}
