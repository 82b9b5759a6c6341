//! Shared key-value store plumbing.
//!
//! All cross-instance state (result cache, job index, queue, metadata
//! cache, single-flight markers) lives in one Redis-compatible store so
//! horizontally scaled instances coordinate. One multiplexed connection
//! manager is cloned per call site.

mod metadata_cache;
mod watchlist;

pub use metadata_cache::MetadataCache;
pub use watchlist::WatchlistCache;

use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::ScrapeResult;

/// Key layout for everything we persist
pub mod keys {
    use crate::model::UserId;

    pub fn watchlist(user: &UserId) -> String {
        format!("watchlist:{user}")
    }

    pub fn job(job_id: &str) -> String {
        format!("job:{job_id}")
    }

    pub fn queue() -> &'static str {
        "job:queue"
    }

    /// Rolling index of recently submitted job ids
    pub fn recent_jobs() -> &'static str {
        "job:recent"
    }

    /// Single-flight marker: current in-flight job for a user
    pub fn user_flight(user: &UserId) -> String {
        format!("job:user:{user}")
    }

    pub fn metadata(normalized_key: &str) -> String {
        format!("metadata:{normalized_key}")
    }
}

/// Handle to the shared store
#[derive(Clone)]
pub struct Store {
    conn: ConnectionManager,
}

impl Store {
    /// Connect and build the multiplexed connection manager
    pub async fn connect(url: &str) -> ScrapeResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to key-value store");
        Ok(Self { conn })
    }

    /// Clone of the underlying connection for direct commands
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Round-trip health probe
    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
