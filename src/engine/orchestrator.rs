//! The scrape orchestrator.
//!
//! Turns a user id into a complete, enriched cache entry: multi-page
//! navigation with early exits, id-dedup merge across pages, synthetic
//! ordering, metadata enrichment, and the cache-write rule. Exactly one
//! task drives a given scrape end-to-end; per-user locks plus a global
//! permit pool keep browsers bounded and users single-flight.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::browser::{BrowserDriver, PageLease};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extractor::{self, ExtractedItem};
use crate::metadata::{MetadataClient, MetadataQuery};
use crate::model::{ExtractionStats, UserId, WatchlistCacheEntry, WatchlistItem};
use crate::store::WatchlistCache;
use crate::utils::constants::{
    IMDB_BASE_URL, ITEM_ACCUMULATOR_CAP, MAX_WATCHLIST_PAGES, MIN_CACHEABLE_ITEMS,
    NAVIGATION_TIMEOUT_SECS, PAGE_ITEM_LIMIT,
};

/// Progress reporting callback, persisted onto the job by the processor
pub type ProgressSink = Arc<dyn for<'a> Fn(&'a str) + Send + Sync>;

/// Egress identity for session persistence when no proxy pool is in play
const DEFAULT_EGRESS_IDENTITY: &str = "default";

/// Orchestrator tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent browser scrapes per instance
    pub max_concurrent_scrapes: usize,
    /// Per-navigation timeout
    pub navigation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scrapes: 2,
            navigation_timeout: Duration::from_secs(NAVIGATION_TIMEOUT_SECS),
        }
    }
}

/// Watchlist URL for one page, newest-first detail view
///
/// `page=N` is the only pagination parameter the source honors; `start=`
/// and `offset=` silently return page 1.
#[must_use]
pub fn watchlist_url(user: &UserId, page: usize) -> String {
    let mut url = format!("{IMDB_BASE_URL}/user/{user}/watchlist?sort=created:desc&view=detail");
    if page > 1 {
        url.push_str(&format!("&page={page}"));
    }
    url
}

/// Outcome of the page-collection phase
struct CollectedPages {
    items: Vec<ExtractedItem>,
    stats: ExtractionStats,
    pages_visited: u64,
    pages_failed: u64,
}

/// Why pagination stopped after a merged page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    /// Fetch the next page
    Continue,
    /// Accumulator reached its hard cap
    CapReached,
    /// The page contributed nothing new
    NothingNew,
    /// A short page means the list is exhausted
    ListExhausted,
}

/// Early-exit rule applied after merging each page
///
/// Bounds wall-clock time on huge lists: stop at the accumulator cap,
/// stop as soon as a page adds nothing (covers the duplicate slices the
/// source serves past its real page count), and stop after any page
/// shorter than the per-page render limit.
#[must_use]
pub fn page_verdict(accumulated: usize, new_count: usize, page_total: usize) -> PageVerdict {
    if accumulated >= ITEM_ACCUMULATOR_CAP {
        PageVerdict::CapReached
    } else if new_count == 0 {
        PageVerdict::NothingNew
    } else if page_total < PAGE_ITEM_LIMIT {
        PageVerdict::ListExhausted
    } else {
        PageVerdict::Continue
    }
}

/// The scrape orchestrator
pub struct ScrapeEngine {
    driver: Arc<BrowserDriver>,
    metadata: Arc<MetadataClient>,
    cache: WatchlistCache,
    config: EngineConfig,
    permits: Semaphore,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ScrapeEngine {
    pub fn new(
        driver: Arc<BrowserDriver>,
        metadata: Arc<MetadataClient>,
        cache: WatchlistCache,
        config: EngineConfig,
    ) -> Self {
        let permits = Semaphore::new(config.max_concurrent_scrapes);
        Self {
            driver,
            metadata,
            cache,
            config,
            permits,
            user_locks: DashMap::new(),
        }
    }

    /// Force-close the browser, used by the processor on job deadline
    pub async fn force_close_browser(&self) {
        self.driver.shutdown().await;
    }

    /// Run one complete scrape for a user
    ///
    /// Extraction success is the success criterion: a total enrichment
    /// failure still caches the (sparser) result.
    pub async fn scrape(
        &self,
        user: &UserId,
        progress: &ProgressSink,
    ) -> ScrapeResult<WatchlistCacheEntry> {
        // Browser phase under the global permit pool and per-user lock.
        // The permit is released before enrichment so the browser slot
        // frees up while we talk to the metadata API.
        let collected = {
            let _permit = self
                .permits
                .acquire()
                .await
                .expect("scrape semaphore is never closed");
            let lock = self
                .user_locks
                .entry(user.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let _guard = lock.lock().await;

            let lease = self
                .driver
                .acquire_page(DEFAULT_EGRESS_IDENTITY)
                .await
                .map_err(|e| ScrapeError::BrowserLaunch(format!("{e:#}")))?;

            let outcome = self.collect_pages(&lease, user, progress).await;
            // Session state is only worth keeping after successful loads
            self.driver.release_page(lease, outcome.is_ok()).await;
            outcome?
        };

        if collected.items.is_empty() {
            return Err(ScrapeError::ExtractionEmpty);
        }
        if collected.items.len() < MIN_CACHEABLE_ITEMS {
            // Too small to trust; do not clobber a previous good result
            return Err(ScrapeError::ExtractionPartial(collected.items.len()));
        }

        // Synthetic ordering: the source returns newest-first per page and
        // exposes no real add-dates, so each item gets a monotonic marker
        // one second apart in first-seen order.
        let base = Utc::now();
        let mut items: Vec<WatchlistItem> = collected
            .items
            .iter()
            .enumerate()
            .map(|(index, raw)| WatchlistItem {
                id: raw.id.clone(),
                title: raw.title.clone(),
                year: raw.year.clone(),
                kind: raw.kind,
                poster: None,
                rating: None,
                rating_count: None,
                runtime_minutes: None,
                popularity: None,
                added_at: base - chrono::Duration::seconds(index as i64),
            })
            .collect();

        let enriched = self.enrich(&mut items, progress).await;

        // Identity on insertion order, but makes the exposed contract
        // (descending added_at) explicit.
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        let mut metadata = BTreeMap::new();
        collected.stats.record_into(&mut metadata);
        metadata.insert("pages_visited".into(), collected.pages_visited);
        metadata.insert("pages_failed".into(), collected.pages_failed);
        metadata.insert("items_total".into(), items.len() as u64);
        metadata.insert("items_enriched".into(), enriched);

        let entry = WatchlistCacheEntry {
            user_id: user.clone(),
            items,
            fetched_at: Utc::now(),
            metadata,
        };

        progress("writing cache");
        self.cache.put(&entry).await?;

        info!(
            user_id = %user,
            items = entry.items.len(),
            enriched,
            pages = collected.pages_visited,
            "scrape complete"
        );
        Ok(entry)
    }

    /// Visit watchlist pages in order, merging by first-seen id
    async fn collect_pages(
        &self,
        lease: &PageLease,
        user: &UserId,
        progress: &ProgressSink,
    ) -> ScrapeResult<CollectedPages> {
        let page = lease.page();
        let mut merged: Vec<ExtractedItem> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stats = ExtractionStats::default();
        let mut pages_visited = 0u64;
        let mut pages_failed = 0u64;
        let mut last_failure: Option<ScrapeError> = None;

        for page_no in 1..=MAX_WATCHLIST_PAGES {
            let url = watchlist_url(user, page_no);
            progress(&format!("navigating page {page_no}"));

            if let Err(e) = self.navigate(page, &url).await {
                warn!(user_id = %user, page = page_no, "page navigation failed: {e}");
                pages_failed += 1;
                last_failure = Some(e);
                continue;
            }

            let extract = match extractor::extract_watchlist_page(page).await {
                Ok(extract) => extract,
                Err(e @ (ScrapeError::UpstreamPrivate | ScrapeError::UpstreamNotFound)) => {
                    // Access blocks are a property of the list, not the
                    // page; no point visiting further pages or retrying.
                    return Err(e);
                }
                Err(e) => {
                    warn!(user_id = %user, page = page_no, "page extraction failed: {e}");
                    pages_failed += 1;
                    last_failure = Some(e);
                    continue;
                }
            };

            pages_visited += 1;
            stats.absorb(&extract.stats);

            let page_total = extract.items.len();
            let mut new_count = 0usize;
            for item in extract.items {
                if seen.insert(item.id.clone()) {
                    merged.push(item);
                    new_count += 1;
                }
            }
            stats.duplicates_skipped += (page_total - new_count) as u64;

            debug!(
                user_id = %user,
                page = page_no,
                page_total,
                new_count,
                accumulated = merged.len(),
                "page merged"
            );

            match page_verdict(merged.len(), new_count, page_total) {
                PageVerdict::Continue => {}
                verdict => {
                    debug!(user_id = %user, ?verdict, "stopping pagination");
                    break;
                }
            }
        }

        if pages_visited == 0 {
            return Err(last_failure.unwrap_or(ScrapeError::ExtractionEmpty));
        }

        Ok(CollectedPages {
            items: merged,
            stats,
            pages_visited,
            pages_failed,
        })
    }

    async fn navigate(&self, page: &chromiumoxide::Page, url: &str) -> ScrapeResult<()> {
        let load = async {
            page.goto(url)
                .await
                .map_err(|e| ScrapeError::NavigationTimeout(format!("goto {url}: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| ScrapeError::NavigationTimeout(format!("load {url}: {e}")))?;
            Ok::<(), ScrapeError>(())
        };

        match tokio::time::timeout(self.config.navigation_timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::NavigationTimeout(format!(
                "{url} exceeded {}s",
                self.config.navigation_timeout.as_secs()
            ))),
        }
    }

    /// Classification correction plus field enrichment
    ///
    /// Returns the number of items that picked up at least one field.
    /// Never fails: a dead metadata API just leaves items unenriched.
    async fn enrich(&self, items: &mut [WatchlistItem], progress: &ProgressSink) -> u64 {
        let mut unique: HashMap<String, MetadataQuery> = HashMap::new();
        for item in items.iter() {
            let query = MetadataQuery {
                title: item.title.clone(),
                year: item.year.clone(),
            };
            unique.entry(query.key()).or_insert(query);
        }
        let queries: Vec<MetadataQuery> = unique.into_values().collect();

        progress(&format!("classifying {} titles", queries.len()));
        let kinds = self.metadata.classify_batch(&queries).await;
        for item in items.iter_mut() {
            let key = MetadataQuery {
                title: item.title.clone(),
                year: item.year.clone(),
            }
            .key();
            if let Some(kind) = kinds.get(&key) {
                item.kind = *kind;
            }
        }

        progress(&format!("enriching {} items", items.len()));
        let entries = self.metadata.lookup_batch(&queries).await;

        let mut enriched = 0u64;
        for item in items.iter_mut() {
            let key = MetadataQuery {
                title: item.title.clone(),
                year: item.year.clone(),
            }
            .key();
            let Some(entry) = entries.get(&key) else {
                continue;
            };
            if entry.is_negative() {
                continue;
            }

            // Fill gaps only; scraped values win over lookups
            if item.poster.is_none() {
                item.poster = entry.poster.clone();
            }
            if item.rating.is_none() {
                item.rating = entry.rating;
            }
            if item.rating_count.is_none() {
                item.rating_count = entry.rating_count;
            }
            if item.runtime_minutes.is_none() {
                item.runtime_minutes = entry.runtime_minutes;
            }
            if item.popularity.is_none() {
                item.popularity = entry.popularity;
            }
            enriched += 1;
        }

        enriched
    }
}

impl std::fmt::Debug for ScrapeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_stops_at_the_right_boundaries() {
        // Short first page: list complete, no page 2
        assert_eq!(page_verdict(180, 180, 180), PageVerdict::ListExhausted);
        // Full first page: keep going
        assert_eq!(page_verdict(250, 250, 250), PageVerdict::Continue);
        // Second page added nothing (250-item list served its tail again)
        assert_eq!(page_verdict(251, 0, 250), PageVerdict::NothingNew);
        // Accumulator cap wins over everything
        assert_eq!(page_verdict(400, 150, 250), PageVerdict::CapReached);
        assert_eq!(page_verdict(430, 250, 250), PageVerdict::CapReached);
        // Overlapping but still-new second page keeps going when full
        assert_eq!(page_verdict(380, 130, 250), PageVerdict::Continue);
    }

    #[test]
    fn watchlist_urls_use_page_parameter() {
        let user: UserId = "ur31595220".parse().expect("valid user id");
        assert_eq!(
            watchlist_url(&user, 1),
            "https://www.imdb.com/user/ur31595220/watchlist?sort=created:desc&view=detail"
        );
        assert_eq!(
            watchlist_url(&user, 2),
            "https://www.imdb.com/user/ur31595220/watchlist?sort=created:desc&view=detail&page=2"
        );
    }
}
