//! Scrape orchestration: multi-page extraction, enrichment, caching.

mod orchestrator;

pub use orchestrator::{
    EngineConfig, PageVerdict, ProgressSink, ScrapeEngine, page_verdict, watchlist_url,
};
