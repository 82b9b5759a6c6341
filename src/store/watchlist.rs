//! Per-user result cache.
//!
//! Stale reads are intentional: `get` returns whatever is cached along
//! with its age, and callers decide whether the entry is fresh enough.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::ScrapeResult;
use crate::model::{UserId, WatchlistCacheEntry};

use super::{Store, keys};

/// TTL-bounded watchlist cache in the shared store
#[derive(Debug, Clone)]
pub struct WatchlistCache {
    store: Store,
    ttl: Duration,
}

impl WatchlistCache {
    pub fn new(store: Store, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch the cached entry and its age, regardless of freshness
    pub async fn get(
        &self,
        user: &UserId,
    ) -> ScrapeResult<Option<(WatchlistCacheEntry, Duration)>> {
        let mut conn = self.store.connection();
        let raw: Option<String> = conn.get(keys::watchlist(user)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let entry: WatchlistCacheEntry = serde_json::from_str(&raw)?;
        let age = entry.age(Utc::now());
        Ok(Some((entry, age)))
    }

    /// Store an entry, resetting the TTL
    pub async fn put(&self, entry: &WatchlistCacheEntry) -> ScrapeResult<()> {
        let mut conn = self.store.connection();
        let raw = serde_json::to_string(entry)?;
        let _: () = conn
            .set_ex(keys::watchlist(&entry.user_id), raw, self.ttl.as_secs())
            .await?;
        debug!(
            "cached {} items for {} (ttl {}s)",
            entry.items.len(),
            entry.user_id,
            self.ttl.as_secs()
        );
        Ok(())
    }

    pub async fn exists(&self, user: &UserId) -> ScrapeResult<bool> {
        let mut conn = self.store.connection();
        Ok(conn.exists(keys::watchlist(user)).await?)
    }
}
