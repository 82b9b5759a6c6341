//! Core domain records.
//!
//! Closed structs only: unknown fields are rejected at ingest so loosely
//! shaped upstream data cannot leak into persisted state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

static USER_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ur\d+$").expect("user id regex"));
static TITLE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^tt\d+$").expect("title id regex"));

/// Earliest plausible release year (the first film recordings)
pub const MIN_TITLE_YEAR: i32 = 1878;

/// Validated source-site user identifier (`ur` + digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if USER_ID_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ScrapeError::Validation(format!(
                "invalid user id {s:?}: expected ur<digits>"
            )))
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a title identifier (`tt` + digits) without allocating a newtype
#[must_use]
pub fn is_valid_title_id(id: &str) -> bool {
    TITLE_ID_RE.is_match(id)
}

/// Check a 4-digit year string against the plausible release range
#[must_use]
pub fn is_plausible_year(year: &str) -> bool {
    year.len() == 4
        && year.parse::<i32>().is_ok_and(|y| {
            let max = Utc::now().year() + 5;
            (MIN_TITLE_YEAR..=max).contains(&y)
        })
}

/// Movie/series discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Movie,
    Series,
}

impl TitleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single titled work extracted from a user's watchlist
///
/// `added_at` is a synthetic monotonic marker derived from extraction
/// order, not the true user add-date (the source does not expose one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WatchlistItem {
    /// Source-site title identifier, `tt` + digits
    pub id: String,
    /// Cleaned title: no ordinal prefix, no edge whitespace
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub kind: TitleKind,
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
    pub added_at: DateTime<Utc>,
}

/// Per-user cached scrape result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WatchlistCacheEntry {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    /// Newest-extracted first
    pub items: Vec<WatchlistItem>,
    pub fetched_at: DateTime<Utc>,
    /// Diagnostic counters: page counts, duplicates filtered, coverage
    #[serde(default)]
    pub metadata: BTreeMap<String, u64>,
}

impl WatchlistCacheEntry {
    /// Age of this entry relative to `now`, saturating at zero
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.fetched_at).to_std().unwrap_or_default()
    }
}

/// Extraction diagnostics accumulated over a scrape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Anchors referencing a title detail path, before any filtering
    pub total_anchors: u64,
    /// Anchors surviving the shadow/sentinel pre-filter
    pub post_filter: u64,
    /// Anchors dropped because their id was already seen this pass
    pub duplicates_skipped: u64,
    /// Anchors whose href carried no parseable title id
    pub missing_id: u64,
    /// Items whose title came from a fallback source, not anchor text
    pub title_fallbacks: u64,
}

impl ExtractionStats {
    pub fn absorb(&mut self, other: &ExtractionStats) {
        self.total_anchors += other.total_anchors;
        self.post_filter += other.post_filter;
        self.duplicates_skipped += other.duplicates_skipped;
        self.missing_id += other.missing_id;
        self.title_fallbacks += other.title_fallbacks;
    }

    /// Flatten into the cache entry's diagnostic map
    pub fn record_into(&self, metadata: &mut BTreeMap<String, u64>) {
        metadata.insert("pre_filter".into(), self.total_anchors);
        metadata.insert("post_filter".into(), self.post_filter);
        metadata.insert("duplicates".into(), self.duplicates_skipped);
        metadata.insert("missing_id".into(), self.missing_id);
        metadata.insert("title_fallbacks".into(), self.title_fallbacks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_canonical_form() {
        assert!("ur31595220".parse::<UserId>().is_ok());
        assert!("xyz".parse::<UserId>().is_err());
        assert!("ur".parse::<UserId>().is_err());
        assert!("UR123".parse::<UserId>().is_err());
    }

    #[test]
    fn title_id_pattern() {
        assert!(is_valid_title_id("tt0110912"));
        assert!(!is_valid_title_id("tt"));
        assert!(!is_valid_title_id("nm0000148"));
    }

    #[test]
    fn year_bounds() {
        assert!(is_plausible_year("1878"));
        assert!(is_plausible_year("1999"));
        assert!(!is_plausible_year("1877"));
        assert!(!is_plausible_year("3020"));
        assert!(!is_plausible_year("99"));
    }
}
