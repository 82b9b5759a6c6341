//! Shared configuration constants for watchscrape
//!
//! Default values and tunables used throughout the codebase to ensure
//! consistency and avoid magic numbers.

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-06-11 to Chrome 137 (current stable)
/// Next update: 2025-09-11 (quarterly schedule)
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.7151.68 Safari/537.36";

/// Base URL of the source site
pub const IMDB_BASE_URL: &str = "https://www.imdb.com";

/// TMDB API base URL
pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";

/// TMDB image CDN base URL
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// Poster size segment used when resolving `poster_path` into a full URL
///
/// `w342` balances catalog rendering quality against CDN transfer size.
/// Larger sizes (`w500`, `w780`) roughly double transfer per poster with
/// no visible gain at typical catalog tile dimensions.
pub const TMDB_POSTER_SIZE: &str = "w342";

/// Items per page the source's virtual scroller renders before pagination
///
/// Empirically verified: a single watchlist page never yields more than
/// 250 title anchors regardless of scroll depth. Lists beyond this size
/// require the `page=N` query parameter (`start=` and `offset=` both
/// silently return page 1).
pub const PAGE_ITEM_LIMIT: usize = 250;

/// Hard cap on accumulated items across all pages of one scrape
pub const ITEM_ACCUMULATOR_CAP: usize = 400;

/// Maximum pagination depth to probe
///
/// Pages 1 and 2 are well-established; deeper pages returned duplicate
/// slices at the ~500-item list sizes tested, so probing stops at the
/// first page that contributes nothing new, bounded here.
pub const MAX_WATCHLIST_PAGES: usize = 5;

/// Minimum extracted items for a scrape to be considered trustworthy
///
/// A smaller result is treated as a transient extraction failure and must
/// not clobber a previously cached good result.
pub const MIN_CACHEABLE_ITEMS: usize = 3;

/// Default watchlist cache TTL: 12 hours
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 43_200;

/// Default TTL for terminal job records: 24 hours
pub const DEFAULT_JOB_TTL_SECONDS: u64 = 86_400;

/// Metadata cache TTL: 7 days
pub const METADATA_CACHE_TTL_SECONDS: u64 = 604_800;

/// Default TMDB request rate (token bucket refill, requests per second)
pub const DEFAULT_METADATA_RATE_RPS: f64 = 40.0;

/// Lookup batch size against the metadata API
pub const METADATA_LOOKUP_BATCH: usize = 50;

/// Classification batch size (each query costs two API calls)
pub const METADATA_CLASSIFY_BATCH: usize = 20;

/// In-flight request cap within one metadata batch
pub const METADATA_CONCURRENCY: usize = 10;

/// Pause between metadata batches
pub const METADATA_BATCH_PAUSE_MS: u64 = 10;

/// Default maximum delivery attempts per job
pub const DEFAULT_MAX_JOB_ATTEMPTS: u32 = 3;

/// Retry backoff base: 5 seconds, doubled per attempt
pub const RETRY_BACKOFF_BASE_SECS: u64 = 5;

/// Retry backoff ceiling: 5 minutes
pub const RETRY_BACKOFF_MAX_SECS: u64 = 300;

/// Hard wall-clock deadline for a single job
pub const JOB_DEADLINE_SECS: u64 = 300;

/// Jobs stuck in `processing` longer than this are reset to `pending` once
pub const STUCK_JOB_TIMEOUT_SECS: u64 = 600;

/// Bounded wait for the synchronous scrape endpoint
pub const SYNC_WAIT_SECS: u64 = 90;

/// Grace window for in-flight jobs during shutdown
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

/// Pending-queue depth beyond which submissions are rejected with 503
pub const QUEUE_MAX_PENDING: usize = 100;

/// Safety TTL on single-flight markers
///
/// Generous enough to outlive a job through every retry; guards against
/// markers leaked by a crashed instance wedging a user forever.
pub const FLIGHT_MARKER_TTL_SECS: u64 = 1_800;

/// Default concurrent browser scrapes per instance
pub const DEFAULT_MAX_CONCURRENT_SCRAPES: usize = 2;

/// Page navigation timeout
pub const NAVIGATION_TIMEOUT_SECS: u64 = 45;

/// Settle time after each scroll step
pub const SCROLL_SETTLE_MS: u64 = 800;

/// Consecutive stagnant scroll iterations before stopping
pub const SCROLL_STAGNANT_LIMIT: u32 = 3;

/// Absolute scroll iteration cap
pub const SCROLL_MAX_ITERATIONS: u32 = 25;
