//! HTTP surface.
//!
//! Five endpoints over axum: health, job submission, job status, recent
//! jobs, cached watchlist retrieval, and the optional synchronous scrape.
//! Everything except `/health` sits behind the bearer middleware.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Assemble the service router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/jobs", post(handlers::submit_job).get(handlers::list_jobs))
        .route("/jobs/{id}", get(handlers::get_job))
        .route("/cache/{user_id}", get(handlers::get_cache))
        .route("/scrape-sync", post(handlers::scrape_sync))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
