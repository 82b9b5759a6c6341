//! Shared state handed to every handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::jobs::JobQueue;
use crate::store::{Store, WatchlistCache};

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub cache: WatchlistCache,
    pub store: Store,
    pub worker_secret: Arc<String>,
    /// Bounded wait for the synchronous scrape endpoint
    pub sync_wait: Duration,
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
