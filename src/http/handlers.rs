//! Endpoint handlers.
//!
//! Request bodies are validated by hand against closed shapes (unknown
//! fields rejected, `userID` pattern-checked) so every rejection flows
//! through the standard error envelope with a 400.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::jobs::{Job, JobStatus, SubmitOutcome};
use crate::model::UserId;

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Poll cadence while a synchronous scrape waits for its job
const SYNC_POLL: Duration = Duration::from_secs(1);

/// `GET /health` — liveness plus store round-trip and queue depth
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let redis_ok = state.store.ping().await;
    let queue_depth = state.queue.depth().await.unwrap_or(0);

    Json(json!({
        "status": if redis_ok { "ok" } else { "degraded" },
        "redis": if redis_ok { "ok" } else { "fail" },
        "uptime_s": state.started_at.elapsed().as_secs(),
        "queue_depth": queue_depth,
    }))
}

/// Validated scrape request body
struct ScrapeRequest {
    user_id: UserId,
    force_refresh: bool,
}

/// Parse `{userID, forceRefresh?}`, rejecting unknown fields
fn parse_scrape_request(body: &Value) -> Result<ScrapeRequest, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("request body must be a JSON object"))?;

    for key in object.keys() {
        if key != "userID" && key != "forceRefresh" {
            return Err(ApiError::bad_request(format!("unknown field {key:?}")));
        }
    }

    let user_id = object
        .get("userID")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("userID is required and must be a string"))?
        .parse::<UserId>()
        .map_err(ApiError::from)?;

    let force_refresh = match object.get("forceRefresh") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(ApiError::bad_request("forceRefresh must be a boolean")),
    };

    Ok(ScrapeRequest {
        user_id,
        force_refresh,
    })
}

/// `POST /jobs` — submit a scrape job
pub async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = parse_scrape_request(&body)?;

    match state
        .queue
        .submit(request.user_id, request.force_refresh)
        .await?
    {
        SubmitOutcome::Enqueued(job) | SubmitOutcome::Attached(job) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "jobID": job.id, "status": job.status })),
        )),
        SubmitOutcome::QueueFull { depth } => Err(ApiError::queue_full(format!(
            "job queue is full ({depth} pending)"
        ))),
    }
}

/// `GET /jobs/{id}` — full job record
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    match state.queue.load(&job_id).await? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::not_found(format!("no job {job_id:?}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    status: Option<String>,
    limit: Option<usize>,
}

/// `GET /jobs?status=&limit=` — recent jobs, newest first
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(ApiError::from)?;
    let limit = query.limit.unwrap_or(50).min(200);

    let jobs = state.queue.list_recent(status, limit).await?;
    Ok(Json(jobs))
}

/// `GET /cache/{userID}` — cached watchlist for a user
pub async fn get_cache(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id: UserId = user_id.parse().map_err(ApiError::from)?;

    match state.cache.get(&user_id).await? {
        Some((entry, age)) => Ok(Json(json!({
            "success": true,
            "data": entry.items,
            "metadata": entry.metadata,
            "fetchedAt": entry.fetched_at,
            "ageSeconds": age.as_secs(),
        }))),
        None => Err(ApiError::not_found(format!(
            "no cached watchlist for {user_id}"
        ))),
    }
}

/// `POST /scrape-sync` — submit and wait (bounded) for completion
///
/// Returns the terminal job when it finishes inside the wait window,
/// otherwise 202 with the job id for polling.
pub async fn scrape_sync(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = parse_scrape_request(&body)?;

    let job = match state
        .queue
        .submit(request.user_id, request.force_refresh)
        .await?
    {
        SubmitOutcome::Enqueued(job) | SubmitOutcome::Attached(job) => job,
        SubmitOutcome::QueueFull { depth } => {
            return Err(ApiError::queue_full(format!(
                "job queue is full ({depth} pending)"
            )));
        }
    };

    let deadline = tokio::time::Instant::now() + state.sync_wait;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(SYNC_POLL).await;

        if let Some(current) = state.queue.load(&job.id).await?
            && current.status.is_terminal()
        {
            debug!(job_id = %current.id, status = %current.status, "sync scrape finished");
            let body = serde_json::to_value(&current)
                .map_err(|e| ApiError::internal(e.to_string()))?;
            return Ok((StatusCode::OK, Json(body)));
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "jobID": job.id, "status": "pending" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_bodies_parse() {
        let request =
            parse_scrape_request(&json!({ "userID": "ur31595220", "forceRefresh": true }))
                .expect("valid request");
        assert_eq!(request.user_id.as_str(), "ur31595220");
        assert!(request.force_refresh);

        let request =
            parse_scrape_request(&json!({ "userID": "ur1" })).expect("forceRefresh optional");
        assert!(!request.force_refresh);
    }

    #[test]
    fn malformed_user_ids_get_400() {
        let err = parse_scrape_request(&json!({ "userID": "xyz" })).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, "ValidationError");

        let err = parse_scrape_request(&json!({})).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn non_boolean_force_refresh_is_rejected() {
        let err = parse_scrape_request(&json!({ "userID": "ur1", "forceRefresh": "yes" }))
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_scrape_request(&json!({ "userID": "ur1", "mystery": 1 })).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
