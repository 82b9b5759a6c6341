//! Error types for the scraping pipeline.
//!
//! One enum covers every failure class that can cross a component boundary.
//! The job processor keys its retry policy off [`ScrapeError::is_transient`];
//! the HTTP layer maps kinds to status codes in `http::error`.

use thiserror::Error;

/// Failure classes for watchlist scraping and serving
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Malformed request input; never retried
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or invalid bearer token; never retried
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No cached entry (or job) for the requested key; never retried
    #[error("not found: {0}")]
    NotFound(String),

    /// The source site reports the watchlist as private; fatal for the job
    #[error("watchlist is private")]
    UpstreamPrivate,

    /// The user identifier does not exist on the source site; fatal
    #[error("user does not exist on source site")]
    UpstreamNotFound,

    /// Page navigation exceeded its timeout; transient
    #[error("navigation timed out: {0}")]
    NavigationTimeout(String),

    /// Headless browser failed to launch; transient
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Zero items extracted across all pages; transient
    #[error("extraction produced zero items")]
    ExtractionEmpty,

    /// Fewer items than the cacheable minimum; transient, never cached
    #[error("extraction produced only {0} items")]
    ExtractionPartial(usize),

    /// Metadata API failure; per-item, never fails the job
    #[error("metadata lookup failed: {0}")]
    Metadata(String),

    /// Shared key-value store failure; transient
    #[error("cache backend error: {0}")]
    CacheBackend(String),

    /// Job hard deadline exceeded; transient
    #[error("job deadline exceeded")]
    Timeout,

    /// Unclassified failure from lower plumbing
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrapeError {
    /// Stable wire name for this error kind, used in job records and
    /// HTTP error envelopes
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Auth(_) => "AuthError",
            Self::NotFound(_) => "NotFound",
            Self::UpstreamPrivate => "UpstreamPrivate",
            Self::UpstreamNotFound => "UpstreamNotFound",
            Self::NavigationTimeout(_) => "NavigationTimeout",
            Self::BrowserLaunch(_) => "BrowserLaunchError",
            Self::ExtractionEmpty => "ExtractionEmpty",
            Self::ExtractionPartial(_) => "ExtractionPartial",
            Self::Metadata(_) => "MetadataError",
            Self::CacheBackend(_) => "CacheBackendError",
            Self::Timeout => "Timeout",
            Self::Other(_) => "InternalError",
        }
    }

    /// Whether the job processor should re-enqueue after this failure
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NavigationTimeout(_)
            | Self::BrowserLaunch(_)
            | Self::ExtractionEmpty
            | Self::ExtractionPartial(_)
            | Self::CacheBackend(_)
            | Self::Timeout => true,
            // Unclassified plumbing failures get the benefit of the doubt
            Self::Other(_) => true,
            Self::Validation(_)
            | Self::Auth(_)
            | Self::NotFound(_)
            | Self::UpstreamPrivate
            | Self::UpstreamNotFound
            | Self::Metadata(_) => false,
        }
    }
}

/// CDP event-stream messages that are noise, not failures
///
/// Chrome emits events chromiumoxide has no enum variant for; the
/// resulting deserialization complaints carry no signal about browser
/// health and must not be logged as errors.
const CDP_NOISE_MARKERS: &[&str] = &[
    "data did not match any variant of untagged enum Message",
    "Failed to deserialize WS response",
];

/// Whether a browser event-stream error is known deserialization noise
#[must_use]
pub fn is_benign_cdp_noise(message: &str) -> bool {
    CDP_NOISE_MARKERS.iter().any(|marker| message.contains(marker))
}

impl From<redis::RedisError> for ScrapeError {
    fn from(err: redis::RedisError) -> Self {
        Self::CacheBackend(err.to_string())
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        Self::CacheBackend(format!("serialization: {err}"))
    }
}

/// Convenience alias used throughout the crate
pub type ScrapeResult<T> = Result<T, ScrapeError>;
