//! Metadata enrichment against TMDB.
//!
//! Translates `(title, year)` lookups into posters, ratings, runtimes and
//! popularity, and refines the movie/series classification. Lookups are
//! cached (negative results included) in the shared store, rate-limited
//! through a global token bucket, and batched with a bounded in-flight
//! window. Individual failures never propagate: a failed lookup yields an
//! empty entry and the item simply stays unenriched.

pub mod client;
pub mod overrides;
pub mod rate_limit;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use tracing::{debug, warn};

use crate::error::ScrapeResult;
use crate::model::TitleKind;
use crate::store::MetadataCache;
use crate::utils::constants::{
    METADATA_BATCH_PAUSE_MS, METADATA_CLASSIFY_BATCH, METADATA_CONCURRENCY,
    METADATA_LOOKUP_BATCH,
};
use crate::utils::titles::normalize_title;

pub use client::{TmdbClient, best_match};
pub use overrides::KindOverrides;
pub use rate_limit::{RateDecision, TokenBucket};
pub use types::{MetadataCacheEntry, MetadataQuery, SearchHit};

/// High-level enrichment client
#[derive(Debug)]
pub struct MetadataClient {
    tmdb: TmdbClient,
    cache: MetadataCache,
    overrides: KindOverrides,
}

impl MetadataClient {
    pub fn new(tmdb: TmdbClient, cache: MetadataCache, overrides: KindOverrides) -> Self {
        Self {
            tmdb,
            cache,
            overrides,
        }
    }

    /// Resolve a batch of lookups into enrichment entries
    ///
    /// Returns one entry per distinct key; entries for failed or empty
    /// lookups are present-but-negative so callers never need to
    /// distinguish.
    pub async fn lookup_batch(
        &self,
        queries: &[MetadataQuery],
    ) -> HashMap<String, MetadataCacheEntry> {
        let mut out = HashMap::with_capacity(queries.len());

        for chunk in queries.chunks(METADATA_LOOKUP_BATCH) {
            let resolved: Vec<(String, MetadataCacheEntry)> = stream::iter(chunk)
                .map(|query| self.lookup_one(query))
                .buffer_unordered(METADATA_CONCURRENCY)
                .collect()
                .await;
            out.extend(resolved);
            tokio::time::sleep(Duration::from_millis(METADATA_BATCH_PAUSE_MS)).await;
        }

        out
    }

    /// Classify a batch of titles as movie or series
    ///
    /// Consults the override table first, then compares top popularity
    /// between the movie and TV search results. Queries with no usable
    /// signal are omitted so the caller keeps its provisional kind.
    pub async fn classify_batch(
        &self,
        queries: &[MetadataQuery],
    ) -> HashMap<String, TitleKind> {
        let mut out = HashMap::with_capacity(queries.len());

        for chunk in queries.chunks(METADATA_CLASSIFY_BATCH) {
            let classified: Vec<Option<(String, TitleKind)>> = stream::iter(chunk)
                .map(|query| self.classify_one(query))
                .buffer_unordered(METADATA_CONCURRENCY)
                .collect()
                .await;
            out.extend(classified.into_iter().flatten());
            tokio::time::sleep(Duration::from_millis(METADATA_BATCH_PAUSE_MS)).await;
        }

        out
    }

    async fn lookup_one(&self, query: &MetadataQuery) -> (String, MetadataCacheEntry) {
        let key = query.key();

        if let Some(entry) = self.cache.get(&key).await {
            return (key, entry);
        }

        match self.resolve(query).await {
            Ok(Some(entry)) => {
                self.cache.put(&key, &entry).await;
                (key, entry)
            }
            Ok(None) => {
                // A true miss is worth remembering; repeated lookups of
                // obscure titles would otherwise hammer the API.
                let entry = MetadataCacheEntry::negative(Utc::now());
                self.cache.put(&key, &entry).await;
                (key, entry)
            }
            Err(e) => {
                // Transport failures are NOT negative-cached: the title
                // may well exist once the API recovers.
                warn!("metadata lookup failed for {key:?}: {e}");
                (key, MetadataCacheEntry::negative(Utc::now()))
            }
        }
    }

    /// Walk the search strategy ladder until a candidate emerges
    async fn resolve(&self, query: &MetadataQuery) -> ScrapeResult<Option<MetadataCacheEntry>> {
        let target_year = query.year.as_deref().and_then(|y| y.parse::<i32>().ok());

        for (title, year) in strategy_ladder(query) {
            let (movies, shows) = tokio::join!(
                self.tmdb.search(TitleKind::Movie, &title, year.as_deref()),
                self.tmdb.search(TitleKind::Series, &title, year.as_deref()),
            );

            let mut candidates: Vec<(SearchHit, TitleKind)> = Vec::new();
            let mut failures = 0;
            match movies {
                Ok(hits) => {
                    candidates.extend(hits.into_iter().map(|h| (h, TitleKind::Movie)));
                }
                Err(e) => {
                    debug!("movie search failed for {title:?}: {e}");
                    failures += 1;
                }
            }
            match shows {
                Ok(hits) => {
                    candidates.extend(hits.into_iter().map(|h| (h, TitleKind::Series)));
                }
                Err(e) => {
                    debug!("tv search failed for {title:?}: {e}");
                    failures += 1;
                }
            }

            if failures == 2 {
                return Err(crate::error::ScrapeError::Metadata(format!(
                    "both searches failed for {title:?}"
                )));
            }

            let Some((hit, kind)) = best_match(candidates, target_year) else {
                continue;
            };

            // Search results rarely carry runtime; a detail fetch failure
            // just leaves the field empty.
            let runtime = match self.tmdb.runtime_minutes(kind, hit.id).await {
                Ok(runtime) => runtime,
                Err(e) => {
                    debug!("detail fetch failed for {kind} {}: {e}", hit.id);
                    None
                }
            };

            return Ok(Some(MetadataCacheEntry {
                poster: hit.poster_path.as_deref().map(|p| self.tmdb.poster_url(p)),
                rating: hit.vote_average,
                rating_count: hit.vote_count,
                runtime_minutes: runtime,
                popularity: hit.popularity,
                cached_at: Utc::now(),
            }));
        }

        Ok(None)
    }

    async fn classify_one(&self, query: &MetadataQuery) -> Option<(String, TitleKind)> {
        let key = query.key();
        let normalized = normalize_title(&query.title);

        if let Some(kind) = self.overrides.get(&normalized) {
            return Some((key, kind));
        }

        let (movies, shows) = tokio::join!(
            self.tmdb
                .search(TitleKind::Movie, &query.title, query.year.as_deref()),
            self.tmdb
                .search(TitleKind::Series, &query.title, query.year.as_deref()),
        );

        let movie_pop = top_popularity(movies.unwrap_or_default().into_iter());
        let tv_pop = top_popularity(shows.unwrap_or_default().into_iter());

        match (movie_pop, tv_pop) {
            (None, None) => None,
            (Some(_), None) => Some((key, TitleKind::Movie)),
            (None, Some(_)) => Some((key, TitleKind::Series)),
            (Some(m), Some(t)) if t > m => Some((key, TitleKind::Series)),
            _ => Some((key, TitleKind::Movie)),
        }
    }
}

fn top_popularity(hits: impl Iterator<Item = SearchHit>) -> Option<f64> {
    hits.map(|h| h.popularity_or_zero())
        .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p))))
}

/// Search strategies in order: exact + year, normalized + year, exact
/// without year, normalized without year. Degenerate duplicates (title
/// already normalized, or no year to drop) collapse away.
fn strategy_ladder(query: &MetadataQuery) -> Vec<(String, Option<String>)> {
    let normalized = normalize_title(&query.title);
    let mut ladder: Vec<(String, Option<String>)> = Vec::with_capacity(4);

    let mut push = |title: String, year: Option<String>| {
        let candidate = (title, year);
        if !ladder.contains(&candidate) {
            ladder.push(candidate);
        }
    };

    push(query.title.clone(), query.year.clone());
    push(normalized.clone(), query.year.clone());
    push(query.title.clone(), None);
    push(normalized, None);

    ladder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_collapses_degenerate_strategies() {
        let full = strategy_ladder(&MetadataQuery {
            title: "The Pianist".into(),
            year: Some("2002".into()),
        });
        assert_eq!(full.len(), 4);

        let yearless_normalized = strategy_ladder(&MetadataQuery {
            title: "heat".into(),
            year: None,
        });
        assert_eq!(yearless_normalized, vec![("heat".to_string(), None)]);
    }
}
