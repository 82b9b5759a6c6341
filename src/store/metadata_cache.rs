//! Enrichment lookup cache.
//!
//! Failures here are absorbed: a broken cache degrades enrichment to
//! live lookups, it never fails a scrape.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::warn;

use crate::metadata::MetadataCacheEntry;

use super::{Store, keys};

/// Metadata cache keyed by normalized `(title, year)`
#[derive(Debug, Clone)]
pub struct MetadataCache {
    store: Store,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(store: Store, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Cached entry for a key, if present and parseable
    pub async fn get(&self, key: &str) -> Option<MetadataCacheEntry> {
        let mut conn = self.store.connection();
        let raw: Option<String> = match conn.get(keys::metadata(key)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("metadata cache read failed for {key:?}: {e}");
                return None;
            }
        };
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Store an entry (negative entries included), resetting the TTL
    pub async fn put(&self, key: &str, entry: &MetadataCacheEntry) {
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("metadata cache serialize failed for {key:?}: {e}");
                return;
            }
        };

        let mut conn = self.store.connection();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(keys::metadata(key), raw, self.ttl.as_secs())
            .await
        {
            warn!("metadata cache write failed for {key:?}: {e}");
        }
    }
}
