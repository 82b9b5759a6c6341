//! Bearer-token authentication middleware.
//!
//! Every endpoint except `/health` requires `Authorization: Bearer
//! <WORKER_SECRET>`. The comparison is constant-time so the secret
//! cannot be probed byte by byte through response timing.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::state::AppState;

pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("expected Bearer authorization"))?;

    if !constant_time_eq(token.as_bytes(), state.worker_secret.as_bytes()) {
        return Err(ApiError::unauthorized("invalid bearer token"));
    }

    Ok(next.run(request).await)
}

/// Length-leaking-only comparison: mismatched lengths return early, equal
/// lengths always scan every byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn comparison_semantics() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(constant_time_eq(b"", b""));
    }
}
