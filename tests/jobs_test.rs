//! Job record wire shape, the retry schedule, and transience
//! classification driving it.

use std::time::Duration;

use watchscrape::jobs::{Job, JobError, JobStatus, backoff_delay};
use watchscrape::model::UserId;
use watchscrape::ScrapeError;

fn user() -> UserId {
    "ur31595220".parse().expect("valid user id")
}

#[test]
fn new_jobs_start_pending_with_zero_attempts() {
    let job = Job::new(user(), false);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.started_at.is_none());
    assert!(job.result.is_none());
    assert!(!job.recovered);
}

#[test]
fn job_wire_format_uses_api_field_names() {
    let job = Job::new(user(), true);
    let value = serde_json::to_value(&job).expect("serializable");
    let object = value.as_object().expect("object");

    assert!(object.contains_key("jobID"));
    assert_eq!(object["userID"], "ur31595220");
    assert_eq!(object["forceRefresh"], true);
    assert_eq!(object["status"], "pending");
    assert!(object.contains_key("createdAt"));
    // absent optionals stay off the wire
    assert!(!object.contains_key("startedAt"));
    assert!(!object.contains_key("error"));

    let parsed: Job = serde_json::from_value(value).expect("round trip");
    assert_eq!(parsed.id, job.id);
    assert_eq!(parsed.user_id, job.user_id);
}

#[test]
fn unknown_job_fields_are_rejected() {
    let raw = serde_json::json!({
        "jobID": "x",
        "userID": "ur1",
        "forceRefresh": false,
        "status": "pending",
        "attempts": 0,
        "createdAt": "2025-01-01T00:00:00Z",
        "surprise": 42,
    });
    assert!(serde_json::from_value::<Job>(raw).is_err());
}

#[test]
fn status_parsing_and_terminality() {
    assert_eq!("pending".parse::<JobStatus>().unwrap(), JobStatus::Pending);
    assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
    assert!("paused".parse::<JobStatus>().is_err());

    assert!(!JobStatus::Pending.is_terminal());
    assert!(!JobStatus::Processing.is_terminal());
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
}

#[test]
fn backoff_doubles_from_base_and_clamps() {
    let base = Duration::from_secs(5);
    let max = Duration::from_secs(300);

    assert_eq!(backoff_delay(base, max, 1), Duration::from_secs(5));
    assert_eq!(backoff_delay(base, max, 2), Duration::from_secs(10));
    assert_eq!(backoff_delay(base, max, 3), Duration::from_secs(20));
    assert_eq!(backoff_delay(base, max, 4), Duration::from_secs(40));
    assert_eq!(backoff_delay(base, max, 7), Duration::from_secs(300));
    // far past the clamp, still the clamp (no overflow)
    assert_eq!(backoff_delay(base, max, 40), Duration::from_secs(300));
}

#[test]
fn transience_drives_the_retry_policy() {
    let transient = [
        ScrapeError::NavigationTimeout("slow".into()),
        ScrapeError::BrowserLaunch("no chrome".into()),
        ScrapeError::ExtractionEmpty,
        ScrapeError::ExtractionPartial(2),
        ScrapeError::CacheBackend("redis down".into()),
        ScrapeError::Timeout,
    ];
    for err in &transient {
        assert!(err.is_transient(), "{} should retry", err.kind());
    }

    let fatal = [
        ScrapeError::Validation("bad".into()),
        ScrapeError::Auth("bad".into()),
        ScrapeError::NotFound("x".into()),
        ScrapeError::UpstreamPrivate,
        ScrapeError::UpstreamNotFound,
        ScrapeError::Metadata("x".into()),
    ];
    for err in &fatal {
        assert!(!err.is_transient(), "{} should not retry", err.kind());
    }
}

#[test]
fn job_errors_carry_the_wire_kind() {
    let err = ScrapeError::UpstreamPrivate;
    let job_err = JobError::from(&err);
    assert_eq!(job_err.kind, "UpstreamPrivate");
    assert!(!job_err.message.is_empty());

    assert_eq!(
        JobError::from(&ScrapeError::ExtractionEmpty).kind,
        "ExtractionEmpty"
    );
}
