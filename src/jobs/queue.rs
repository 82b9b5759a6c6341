//! Redis-backed job queue and index.
//!
//! Jobs live as hashes (`status` field mirrored out of the JSON payload
//! so status transitions can compare-and-set atomically via a small Lua
//! script), the FIFO queue is a list of job ids, and a rolling index
//! feeds the recent-jobs listing and stuck-job recovery.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use redis::Script;
use tracing::{debug, info, warn};

use crate::error::{ScrapeError, ScrapeResult};
use crate::model::UserId;
use crate::store::{Store, keys};

use super::types::{Job, JobStatus};

/// Rolling recent-jobs index length
const RECENT_INDEX_LEN: isize = 200;

/// Compare-and-set on the mirrored status field; updates payload only
/// when the expected status still holds. Returns 1 on success.
fn cas_script() -> Script {
    Script::new(
        r#"
        local current = redis.call('HGET', KEYS[1], 'status')
        if current == ARGV[1] then
            redis.call('HSET', KEYS[1], 'status', ARGV[2], 'data', ARGV[3])
            return 1
        end
        return 0
        "#,
    )
}

/// Delete the single-flight marker only if it still names this job.
fn clear_marker_script() -> Script {
    Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
        "#,
    )
}

/// Outcome of a submission
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// A new job was created and enqueued
    Enqueued(Job),
    /// An in-flight job for this user already exists; caller attaches
    Attached(Job),
    /// Pending depth exceeds the configured bound
    QueueFull { depth: usize },
}

/// Job queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// TTL applied to job records
    pub job_ttl: Duration,
    /// TTL on single-flight markers (safety valve against leaked markers)
    pub flight_marker_ttl: Duration,
    /// Pending-depth bound for backpressure
    pub max_pending: usize,
}

/// Redis-backed FIFO job queue with per-user single-flight
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: Store,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(store: Store, config: QueueConfig) -> Self {
        Self { store, config }
    }

    /// Submit work for a user
    ///
    /// If a non-terminal job already exists for the user, the caller
    /// attaches to it instead of creating a duplicate (single-flight).
    pub async fn submit(&self, user_id: UserId, force_refresh: bool) -> ScrapeResult<SubmitOutcome> {
        let mut conn = self.store.connection();

        let depth = self.depth().await?;
        if depth >= self.config.max_pending {
            return Ok(SubmitOutcome::QueueFull { depth });
        }

        let flight_key = keys::user_flight(&user_id);
        let existing: Option<String> = conn.get(&flight_key).await?;
        if let Some(job_id) = existing {
            match self.load(&job_id).await? {
                Some(job) if !job.status.is_terminal() => {
                    debug!(user_id = %user_id, job_id = %job.id, "attached to in-flight job");
                    return Ok(SubmitOutcome::Attached(job));
                }
                // Terminal or vanished job behind the marker: stale, fall
                // through and replace it.
                _ => {}
            }
        }

        let job = Job::new(user_id, force_refresh);
        self.save(&job).await?;

        let _: () = conn
            .set_ex(
                &flight_key,
                &job.id,
                self.config.flight_marker_ttl.as_secs(),
            )
            .await?;
        let _: () = conn.rpush(keys::queue(), &job.id).await?;
        let _: () = conn.lpush(keys::recent_jobs(), &job.id).await?;
        let _: () = conn
            .ltrim(keys::recent_jobs(), 0, RECENT_INDEX_LEN - 1)
            .await?;

        info!(user_id = %job.user_id, job_id = %job.id, "job enqueued");
        Ok(SubmitOutcome::Enqueued(job))
    }

    /// Persist a job record (non-transitional writes)
    pub async fn save(&self, job: &Job) -> ScrapeResult<()> {
        let mut conn = self.store.connection();
        let data = serde_json::to_string(job)?;
        let key = keys::job(&job.id);
        let _: () = conn
            .hset_multiple(&key, &[("status", job.status.as_str()), ("data", data.as_str())])
            .await?;
        let _: () = conn.expire(&key, self.config.job_ttl.as_secs() as i64).await?;
        Ok(())
    }

    /// Load a job by id
    pub async fn load(&self, job_id: &str) -> ScrapeResult<Option<Job>> {
        let mut conn = self.store.connection();
        let raw: Option<String> = conn.hget(keys::job(job_id), "data").await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Atomically transition a job between states
    ///
    /// The job's in-memory status must already be set to `to`; the write
    /// only lands if the stored status still equals `from`. Returns false
    /// when another processor won the race.
    pub async fn transition(&self, job: &Job, from: JobStatus, to: JobStatus) -> ScrapeResult<bool> {
        debug_assert_eq!(job.status, to);
        let mut conn = self.store.connection();
        let data = serde_json::to_string(job)?;
        let applied: i64 = cas_script()
            .key(keys::job(&job.id))
            .arg(from.as_str())
            .arg(to.as_str())
            .arg(data)
            .invoke_async(&mut conn)
            .await?;

        if applied == 1 && to.is_terminal() {
            let _: () = conn
                .expire(keys::job(&job.id), self.config.job_ttl.as_secs() as i64)
                .await?;
        }
        Ok(applied == 1)
    }

    /// Pop the next due job from the FIFO queue
    ///
    /// Jobs whose `next_retry_at` lies in the future rotate to the back
    /// of the queue instead of being delivered.
    pub async fn pop_due(&self) -> ScrapeResult<Option<Job>> {
        let mut conn = self.store.connection();
        let job_id: Option<String> = conn.lpop(keys::queue(), None).await?;
        let Some(job_id) = job_id else {
            return Ok(None);
        };

        let Some(job) = self.load(&job_id).await? else {
            warn!(job_id = %job_id, "queued job record vanished, dropping");
            return Ok(None);
        };

        if let Some(due) = job.next_retry_at
            && due > Utc::now()
        {
            let _: () = conn.rpush(keys::queue(), &job_id).await?;
            return Ok(None);
        }

        Ok(Some(job))
    }

    /// Re-enqueue a job (retry path)
    pub async fn requeue(&self, job: &Job) -> ScrapeResult<()> {
        let mut conn = self.store.connection();
        let _: () = conn.rpush(keys::queue(), &job.id).await?;
        Ok(())
    }

    /// Pending-queue depth
    pub async fn depth(&self) -> ScrapeResult<usize> {
        let mut conn = self.store.connection();
        let depth: usize = conn.llen(keys::queue()).await?;
        Ok(depth)
    }

    /// Recently submitted jobs, optionally filtered by status
    pub async fn list_recent(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> ScrapeResult<Vec<Job>> {
        let mut conn = self.store.connection();
        let ids: Vec<String> = conn.lrange(keys::recent_jobs(), 0, RECENT_INDEX_LEN - 1).await?;

        let mut jobs = Vec::new();
        for id in ids {
            if jobs.len() >= limit {
                break;
            }
            if let Some(job) = self.load(&id).await?
                && status.is_none_or(|s| job.status == s)
            {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Record a progress string and heartbeat on a job
    ///
    /// Plain save, no CAS: progress is advisory and must never block the
    /// real state machine.
    pub async fn set_progress(&self, job_id: &str, message: &str) {
        match self.load(job_id).await {
            Ok(Some(mut job)) => {
                job.progress = Some(message.to_string());
                job.heartbeat_at = Some(Utc::now());
                if let Err(e) = self.save(&job).await {
                    warn!(job_id = %job_id, "failed to persist progress: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(job_id = %job_id, "failed to load job for progress: {e}"),
        }
    }

    /// Clear the single-flight marker if it still belongs to this job
    pub async fn clear_flight_marker(&self, user_id: &UserId, job_id: &str) {
        let mut conn = self.store.connection();
        let result: Result<i64, _> = clear_marker_script()
            .key(keys::user_flight(user_id))
            .arg(job_id)
            .invoke_async(&mut conn)
            .await;
        if let Err(e) = result {
            warn!(user_id = %user_id, "failed to clear single-flight marker: {e}");
        }
    }

    /// Reset jobs stuck in `processing` back to `pending`, once each
    ///
    /// A job is stuck when its last heartbeat (or start) is older than
    /// `timeout`. Runs over the recent index, so an instance crash loses
    /// at most the jobs that aged out of it.
    pub async fn recover_stuck(&self, timeout: Duration) -> ScrapeResult<usize> {
        let stuck_before = Utc::now()
            - chrono::Duration::from_std(timeout).map_err(|e| {
                ScrapeError::Validation(format!("stuck timeout out of range: {e}"))
            })?;

        let candidates = self.list_recent(Some(JobStatus::Processing), usize::MAX).await?;
        let mut recovered = 0;

        for mut job in candidates {
            let last_alive = job.heartbeat_at.or(job.started_at).unwrap_or(job.created_at);
            if last_alive > stuck_before {
                continue;
            }
            if job.recovered {
                // Second stall: give up rather than loop forever
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
                job.error = Some(super::types::JobError {
                    kind: "Timeout".to_string(),
                    message: "job stalled twice in processing".to_string(),
                });
                if self.transition(&job, JobStatus::Processing, JobStatus::Failed).await? {
                    self.clear_flight_marker(&job.user_id, &job.id).await;
                    warn!(job_id = %job.id, "stuck twice, failing job");
                }
                continue;
            }

            job.status = JobStatus::Pending;
            job.recovered = true;
            job.attempts = job.attempts.saturating_add(1);
            job.progress = Some("recovered from stalled processor".to_string());
            if self.transition(&job, JobStatus::Processing, JobStatus::Pending).await? {
                self.requeue(&job).await?;
                recovered += 1;
                info!(job_id = %job.id, "recovered stuck job");
            }
        }

        Ok(recovered)
    }
}
