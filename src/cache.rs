//! Process-local TTL caches.
//!
//! Two independent instances with the same contract shape: a snapshot of
//! category names (read on every classification) and a per-user spending
//! summary (read on every coach chat). Entries are replaced wholesale,
//! never edited in place; invalidation always clears. Both are injected
//! through `AppState` so tests get a fresh instance each.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use tokio::sync::RwLock;

use crate::Db;
use crate::constants::{CATEGORY_CACHE_TTL_SECS, SUMMARY_CACHE_TTL_SECS};
use crate::utils::{db_error, db_error_with_context};

/// Read-through cache of the category name list (10 min TTL).
///
/// Concurrent misses may refetch redundantly; the refetch is an
/// idempotent read, so no single-flight guard is applied here.
#[derive(Clone)]
pub struct CategoryCache {
    inner: Arc<RwLock<Option<(Vec<String>, Instant)>>>,
    ttl: Duration,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CATEGORY_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    /// Return the cached name list, refetching from the database when the
    /// snapshot is absent or older than the TTL.
    pub async fn get(&self, db: &Db) -> Result<Vec<String>, (StatusCode, String)> {
        {
            let guard = self.inner.read().await;
            if let Some((names, stored_at)) = guard.as_ref() {
                if stored_at.elapsed() < self.ttl {
                    return Ok(names.clone());
                }
            }
        }

        let names = fetch_category_names(db).await?;

        let mut guard = self.inner.write().await;
        *guard = Some((names.clone(), Instant::now()));
        Ok(names)
    }

    /// Drop the snapshot unconditionally. Call after category mutation.
    pub async fn invalidate(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_category_names(db: &Db) -> Result<Vec<String>, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query("SELECT name FROM categories ORDER BY name ASC", ())
        .await
        .map_err(|_| db_error_with_context("failed to query categories"))?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await.map_err(|_| db_error())? {
        let name: String = row.get(0).map_err(|_| db_error())?;
        names.push(name);
    }
    Ok(names)
}

/// Per-user spending summary cache (2 min TTL).
///
/// Invalidated synchronously after every transaction write for the user,
/// so a summary read is never more stale than the most recent write.
#[derive(Clone)]
pub struct SummaryCache {
    inner: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    ttl: Duration,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(SUMMARY_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<String> {
        let guard = self.inner.read().await;
        match guard.get(user_id) {
            Some((summary, stored_at)) if stored_at.elapsed() < self.ttl => {
                Some(summary.clone())
            }
            _ => None,
        }
    }

    pub async fn put(&self, user_id: &str, summary: String) {
        let mut guard = self.inner.write().await;
        guard.insert(user_id.to_string(), (summary, Instant::now()));
    }

    /// Remove only this user's entry.
    pub async fn invalidate(&self, user_id: &str) {
        let mut guard = self.inner.write().await;
        guard.remove(user_id);
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new()
    }
}
