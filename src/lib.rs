//! watchscrape: IMDb watchlist extraction and enrichment service.
//!
//! A job-queue-driven pipeline that turns a public watchlist into an
//! enriched, ordered catalog: headless-Chrome multi-page extraction with
//! shadow-duplicate filtering, TMDB enrichment with persistent caching,
//! and a small bearer-authenticated HTTP surface over a shared Redis
//! store. Designed to run as one or more identical instances behind the
//! consuming add-on service.

pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod http;
pub mod jobs;
pub mod metadata;
pub mod model;
pub mod session;
pub mod stealth;
pub mod store;
pub mod utils;

pub use browser::{BrowserDriver, DriverConfig, cleanup_stale_profiles};
pub use config::ServiceConfig;
pub use engine::{EngineConfig, ScrapeEngine, watchlist_url};
pub use error::{ScrapeError, ScrapeResult};
pub use extractor::{ExtractedItem, detect_access_block, extract_items};
pub use jobs::{Job, JobQueue, JobStatus, Processor, ProcessorConfig, QueueConfig, SubmitOutcome};
pub use metadata::{
    KindOverrides, MetadataCacheEntry, MetadataClient, MetadataQuery, TmdbClient, TokenBucket,
};
pub use model::{
    ExtractionStats, TitleKind, UserId, WatchlistCacheEntry, WatchlistItem, is_valid_title_id,
};
pub use session::{SessionStore, StorageState};
pub use store::{MetadataCache, Store, WatchlistCache};
