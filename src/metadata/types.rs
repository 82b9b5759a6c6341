//! Metadata API wire types and the cached enrichment record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::titles::metadata_key;

/// A `(title, year)` enrichment lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataQuery {
    /// Cleaned title (no ordinal prefix)
    pub title: String,
    /// 4-digit year, if known
    pub year: Option<String>,
}

impl MetadataQuery {
    /// Cache key: normalized title + `_` + (year | "unknown")
    #[must_use]
    pub fn key(&self) -> String {
        metadata_key(&self.title, self.year.as_deref())
    }
}

/// Cached enrichment result, including negative hits (all fields absent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MetadataCacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    pub cached_at: DateTime<Utc>,
}

impl MetadataCacheEntry {
    /// An entry recording that the source had nothing for this key
    #[must_use]
    pub fn negative(now: DateTime<Utc>) -> Self {
        Self {
            poster: None,
            rating: None,
            rating_count: None,
            runtime_minutes: None,
            popularity: None,
            cached_at: now,
        }
    }

    /// True when the lookup found nothing
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.poster.is_none()
            && self.rating.is_none()
            && self.rating_count.is_none()
            && self.runtime_minutes.is_none()
            && self.popularity.is_none()
    }
}

/// One result row from a TMDB search endpoint
///
/// Movie results carry `title`/`release_date`; TV results carry
/// `name`/`first_air_date`. Everything else is shared.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u64>,
    #[serde(default)]
    pub popularity: Option<f64>,
}

impl SearchHit {
    /// Release year across the movie/TV field split
    #[must_use]
    pub fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    #[must_use]
    pub fn popularity_or_zero(&self) -> f64 {
        self.popularity.unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct MovieDetail {
    #[serde(default)]
    pub runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TvDetail {
    #[serde(default)]
    pub episode_run_time: Vec<u32>,
}
