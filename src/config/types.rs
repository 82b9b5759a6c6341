use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::constants::{
    DEFAULT_CACHE_TTL_SECONDS, DEFAULT_JOB_TTL_SECONDS, DEFAULT_MAX_CONCURRENT_SCRAPES,
    DEFAULT_MAX_JOB_ATTEMPTS, DEFAULT_METADATA_RATE_RPS, JOB_DEADLINE_SECS,
    METADATA_CACHE_TTL_SECONDS, QUEUE_MAX_PENDING, RETRY_BACKOFF_BASE_SECS,
    RETRY_BACKOFF_MAX_SECS, SHUTDOWN_GRACE_SECS, STUCK_JOB_TIMEOUT_SECS, SYNC_WAIT_SECS,
};

/// Runtime configuration assembled from the environment
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port (`PORT`, default 7878)
    pub port: u16,
    /// Shared bearer secret for all endpoints except `/health` (`WORKER_SECRET`)
    pub worker_secret: String,
    /// Shared key-value store (`REDIS_URL`)
    pub redis_url: String,
    /// Upstream metadata API key (`METADATA_API_KEY`)
    pub metadata_api_key: String,
    /// Directory for session storage blobs (`SESSION_DIR`)
    pub session_dir: PathBuf,
    /// Watchlist result cache TTL (`CACHE_TTL_SECONDS`)
    pub cache_ttl: Duration,
    /// TTL for terminal job records
    pub job_ttl: Duration,
    /// Metadata cache TTL
    pub metadata_ttl: Duration,
    /// Maximum delivery attempts per job (`MAX_JOB_ATTEMPTS`)
    pub max_job_attempts: u32,
    /// Token bucket refill for the metadata API (`METADATA_RATE_RPS`)
    pub metadata_rate_rps: f64,
    /// Concurrent browser scrapes per instance (`MAX_CONCURRENT_SCRAPES`)
    pub max_concurrent_scrapes: usize,
    /// Optional classification override data file (`KIND_OVERRIDES_PATH`)
    pub kind_overrides_path: Option<PathBuf>,
    /// Run Chrome headless (`HEADLESS`, default true)
    pub headless: bool,
    /// Hard wall-clock deadline per job
    pub job_deadline: Duration,
    /// Reset threshold for jobs stuck in `processing`
    pub stuck_job_timeout: Duration,
    /// Exponential backoff base
    pub retry_backoff_base: Duration,
    /// Exponential backoff ceiling
    pub retry_backoff_max: Duration,
    /// Bounded wait for `POST /scrape-sync`
    pub sync_wait: Duration,
    /// Grace window for in-flight jobs during shutdown
    pub shutdown_grace: Duration,
    /// Pending-queue depth beyond which submissions get 503
    pub queue_max_pending: usize,
}

impl ServiceConfig {
    /// Build configuration from process environment
    ///
    /// Missing required secrets are an error; malformed optional values
    /// fall back to defaults with a warning so a typo'd tunable does not
    /// keep the service down.
    pub fn from_env() -> ScrapeResult<Self> {
        let worker_secret = require_env("WORKER_SECRET")?;
        let metadata_api_key = require_env("METADATA_API_KEY")?;

        let session_dir = std::env::var("SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("watchscrape_sessions"));

        Ok(Self {
            port: parse_env("PORT", 7878),
            worker_secret,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            metadata_api_key,
            session_dir,
            cache_ttl: Duration::from_secs(parse_env(
                "CACHE_TTL_SECONDS",
                DEFAULT_CACHE_TTL_SECONDS,
            )),
            job_ttl: Duration::from_secs(DEFAULT_JOB_TTL_SECONDS),
            metadata_ttl: Duration::from_secs(METADATA_CACHE_TTL_SECONDS),
            max_job_attempts: parse_env("MAX_JOB_ATTEMPTS", DEFAULT_MAX_JOB_ATTEMPTS),
            metadata_rate_rps: parse_env("METADATA_RATE_RPS", DEFAULT_METADATA_RATE_RPS),
            max_concurrent_scrapes: parse_env(
                "MAX_CONCURRENT_SCRAPES",
                DEFAULT_MAX_CONCURRENT_SCRAPES,
            ),
            kind_overrides_path: std::env::var("KIND_OVERRIDES_PATH").ok().map(PathBuf::from),
            headless: parse_env("HEADLESS", true),
            job_deadline: Duration::from_secs(JOB_DEADLINE_SECS),
            stuck_job_timeout: Duration::from_secs(STUCK_JOB_TIMEOUT_SECS),
            retry_backoff_base: Duration::from_secs(RETRY_BACKOFF_BASE_SECS),
            retry_backoff_max: Duration::from_secs(RETRY_BACKOFF_MAX_SECS),
            sync_wait: Duration::from_secs(SYNC_WAIT_SECS),
            shutdown_grace: Duration::from_secs(SHUTDOWN_GRACE_SECS),
            queue_max_pending: QUEUE_MAX_PENDING,
        })
    }
}

fn require_env(name: &str) -> ScrapeResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ScrapeError::Validation(format!(
            "required environment variable {name} is not set"
        ))),
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring malformed {name}={raw:?}, using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}
