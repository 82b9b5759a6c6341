//! Low-level TMDB HTTP client.
//!
//! Thin, rate-limited wrapper over the three endpoints the pipeline
//! needs: movie search, TV search, and detail fetches for runtime. Base
//! URLs are injectable so tests can point the client at a local fake.

use std::time::Duration;

use tracing::trace;

use crate::error::ScrapeResult;
use crate::model::TitleKind;
use crate::utils::constants::{TMDB_API_BASE, TMDB_IMAGE_BASE, TMDB_POSTER_SIZE};

use super::rate_limit::TokenBucket;
use super::types::{MovieDetail, SearchHit, SearchResponse, TvDetail};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate-limited TMDB client
#[derive(Debug)]
pub struct TmdbClient {
    http: reqwest::Client,
    api_base: String,
    image_base: String,
    api_key: String,
    bucket: TokenBucket,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, rate_rps: f64) -> Self {
        Self::with_bases(api_key, rate_rps, TMDB_API_BASE, TMDB_IMAGE_BASE)
    }

    /// Construct against alternative base URLs (test fakes)
    pub fn with_bases(
        api_key: impl Into<String>,
        rate_rps: f64,
        api_base: impl Into<String>,
        image_base: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction is infallible with these options");
        Self {
            http,
            api_base: api_base.into(),
            image_base: image_base.into(),
            api_key: api_key.into(),
            bucket: TokenBucket::new(rate_rps),
        }
    }

    /// Search one catalog half (`movie` or `tv`) for a title
    pub async fn search(
        &self,
        kind: TitleKind,
        query: &str,
        year: Option<&str>,
    ) -> ScrapeResult<Vec<SearchHit>> {
        self.bucket.acquire().await;

        let (path, year_param) = match kind {
            TitleKind::Movie => ("/search/movie", "year"),
            TitleKind::Series => ("/search/tv", "first_air_date_year"),
        };

        let url = format!("{}{}", self.api_base, path);
        let mut request = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("query", query)]);
        if let Some(year) = year {
            request = request.query(&[(year_param, year)]);
        }

        trace!("tmdb search {kind} query={query:?} year={year:?}");
        let response = request.send().await?.error_for_status()?;
        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }

    /// Fetch the runtime for a chosen candidate
    ///
    /// Movies expose `runtime` directly; series expose a per-episode
    /// run-time list, of which we take the first entry.
    pub async fn runtime_minutes(&self, kind: TitleKind, id: u64) -> ScrapeResult<Option<u32>> {
        self.bucket.acquire().await;

        match kind {
            TitleKind::Movie => {
                let url = format!("{}/movie/{id}", self.api_base);
                let detail: MovieDetail = self
                    .http
                    .get(&url)
                    .query(&[("api_key", self.api_key.as_str())])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(detail.runtime.filter(|&r| r > 0))
            }
            TitleKind::Series => {
                let url = format!("{}/tv/{id}", self.api_base);
                let detail: TvDetail = self
                    .http
                    .get(&url)
                    .query(&[("api_key", self.api_key.as_str())])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(detail.episode_run_time.into_iter().find(|&r| r > 0))
            }
        }
    }

    /// Resolve a `poster_path` into a CDN URL
    #[must_use]
    pub fn poster_url(&self, poster_path: &str) -> String {
        format!("{}/{}{}", self.image_base, TMDB_POSTER_SIZE, poster_path)
    }
}

/// Pick the best candidate for a query
///
/// With a target year: smallest year distance wins, popularity breaks
/// ties. Without: highest popularity wins. Candidates lacking a release
/// year sort after any dated candidate when a target year exists.
pub fn best_match(
    candidates: Vec<(SearchHit, TitleKind)>,
    target_year: Option<i32>,
) -> Option<(SearchHit, TitleKind)> {
    if candidates.is_empty() {
        return None;
    }

    match target_year {
        Some(target) => candidates.into_iter().min_by(|(a, _), (b, _)| {
            let da = year_distance(a, target);
            let db = year_distance(b, target);
            da.cmp(&db).then(
                b.popularity_or_zero()
                    .partial_cmp(&a.popularity_or_zero())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        }),
        None => candidates.into_iter().max_by(|(a, _), (b, _)| {
            a.popularity_or_zero()
                .partial_cmp(&b.popularity_or_zero())
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
}

fn year_distance(hit: &SearchHit, target: i32) -> i64 {
    match hit.release_year() {
        Some(year) => (i64::from(year) - i64::from(target)).abs(),
        // undated candidates lose to any dated one
        None => i64::MAX,
    }
}
