//! The job processing loop.
//!
//! One processor per service instance: dequeues due jobs, runs the
//! orchestrator under the job deadline, and applies the retry policy.
//! All state transitions go through the queue's compare-and-set so two
//! instances can share the store without double-completing a job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::{ProgressSink, ScrapeEngine};
use crate::error::ScrapeError;
use crate::model::WatchlistCacheEntry;
use crate::store::{WatchlistCache, keys};

use super::queue::JobQueue;
use super::types::{Job, JobError, JobResult, JobStatus, backoff_delay};

/// Poll interval when the queue is empty
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Stuck-job sweep interval
const RECOVERY_INTERVAL: Duration = Duration::from_secs(60);

/// Processor tunables
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub max_attempts: u32,
    pub retry_backoff_base: Duration,
    pub retry_backoff_max: Duration,
    pub job_deadline: Duration,
    pub stuck_job_timeout: Duration,
}

/// Job processor driving the scrape engine
pub struct Processor {
    queue: Arc<JobQueue>,
    engine: Arc<ScrapeEngine>,
    cache: WatchlistCache,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        queue: Arc<JobQueue>,
        engine: Arc<ScrapeEngine>,
        cache: WatchlistCache,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            queue,
            engine,
            cache,
            config,
        }
    }

    /// Run until the shutdown signal flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("job processor started");
        let mut last_recovery = tokio::time::Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            if last_recovery.elapsed() >= RECOVERY_INTERVAL {
                last_recovery = tokio::time::Instant::now();
                match self.queue.recover_stuck(self.config.stuck_job_timeout).await {
                    Ok(0) => {}
                    Ok(n) => info!("recovered {n} stuck jobs"),
                    Err(e) => warn!("stuck-job recovery failed: {e}"),
                }
            }

            match self.queue.pop_due().await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    error!("queue poll failed: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("job processor stopped");
    }

    async fn process(&self, mut job: Job) {
        // Claim the job; losing the CAS means another processor has it
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        job.heartbeat_at = Some(Utc::now());
        job.attempts += 1;
        job.next_retry_at = None;
        match self
            .queue
            .transition(&job, JobStatus::Pending, JobStatus::Processing)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job.id, "lost claim race, skipping");
                return;
            }
            Err(e) => {
                warn!(job_id = %job.id, "failed to claim job: {e}");
                return;
            }
        }

        info!(
            job_id = %job.id,
            user_id = %job.user_id,
            attempt = job.attempts,
            force_refresh = job.force_refresh,
            "processing job"
        );

        // Cache-hit short-circuit: a fresh entry satisfies the job
        // without a browser in the loop.
        if !job.force_refresh {
            match self.cache.get(&job.user_id).await {
                Ok(Some((entry, age))) if age < self.cache.ttl() => {
                    debug!(job_id = %job.id, age_s = age.as_secs(), "fresh cache hit, skipping scrape");
                    job.progress = Some("served from cache".to_string());
                    self.complete(job, &entry).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => warn!(job_id = %job.id, "cache probe failed, scraping anyway: {e}"),
            }
        }

        let progress = self.progress_sink(&job.id);
        let outcome = tokio::time::timeout(
            self.config.job_deadline,
            self.engine.scrape(&job.user_id, &progress),
        )
        .await;

        match outcome {
            Ok(Ok(entry)) => self.complete(job, &entry).await,
            Ok(Err(e)) => self.handle_failure(job, e).await,
            Err(_elapsed) => {
                // Deadline hit: the browser may be wedged mid-navigation;
                // force-close it so the next job starts clean.
                warn!(job_id = %job.id, "job deadline exceeded, force-closing browser");
                self.engine.force_close_browser().await;
                self.handle_failure(job, ScrapeError::Timeout).await;
            }
        }
    }

    async fn complete(&self, mut job: Job, entry: &WatchlistCacheEntry) {
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        job.result = Some(JobResult {
            cache_key: keys::watchlist(&entry.user_id),
            item_count: entry.items.len(),
        });
        job.error = None;

        match self
            .queue
            .transition(&job, JobStatus::Processing, JobStatus::Completed)
            .await
        {
            Ok(true) => {
                info!(job_id = %job.id, items = entry.items.len(), "job completed");
            }
            Ok(false) => warn!(job_id = %job.id, "completion lost a transition race"),
            Err(e) => error!(job_id = %job.id, "failed to persist completion: {e}"),
        }

        self.queue.clear_flight_marker(&job.user_id, &job.id).await;
    }

    async fn handle_failure(&self, mut job: Job, err: ScrapeError) {
        let retry = err.is_transient() && job.attempts < self.config.max_attempts;

        if retry {
            let delay = backoff_delay(
                self.config.retry_backoff_base,
                self.config.retry_backoff_max,
                job.attempts,
            );
            warn!(
                job_id = %job.id,
                user_id = %job.user_id,
                attempt = job.attempts,
                kind = err.kind(),
                retry_in_s = delay.as_secs(),
                "job attempt failed, re-enqueueing"
            );

            job.status = JobStatus::Pending;
            job.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(delay.as_secs() as i64));
            job.progress = Some(format!("retrying after {}: {}", err.kind(), err));
            match self
                .queue
                .transition(&job, JobStatus::Processing, JobStatus::Pending)
                .await
            {
                Ok(true) => {
                    if let Err(e) = self.queue.requeue(&job).await {
                        error!(job_id = %job.id, "failed to re-enqueue: {e}");
                    }
                }
                Ok(false) => warn!(job_id = %job.id, "retry lost a transition race"),
                Err(e) => error!(job_id = %job.id, "failed to persist retry: {e}"),
            }
            return;
        }

        error!(
            job_id = %job.id,
            user_id = %job.user_id,
            attempt = job.attempts,
            kind = err.kind(),
            "job failed terminally: {err}"
        );

        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.error = Some(JobError::from(&err));
        match self
            .queue
            .transition(&job, JobStatus::Processing, JobStatus::Failed)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(job_id = %job.id, "failure lost a transition race"),
            Err(e) => error!(job_id = %job.id, "failed to persist failure: {e}"),
        }

        self.queue.clear_flight_marker(&job.user_id, &job.id).await;
    }

    /// Build the progress callback persisted through the queue
    fn progress_sink(&self, job_id: &str) -> ProgressSink {
        let queue = Arc::clone(&self.queue);
        let job_id = job_id.to_string();
        Arc::new(move |message: &str| {
            let queue = Arc::clone(&queue);
            let job_id = job_id.clone();
            let message = message.to_string();
            tokio::spawn(report_progress(queue, job_id, message));
        })
    }
}

async fn report_progress(queue: Arc<JobQueue>, job_id: String, message: String) {
    queue.set_progress(&job_id, &message).await;
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
