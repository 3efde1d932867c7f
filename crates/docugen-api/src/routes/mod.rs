//! API routes.

pub mod health;
pub mod jobs;

use crate::AppState;
use axum::Router;

/// Build the main API router: the `/v1/jobs` resource plus a health
/// check, one module per resource, mirroring the original router
/// assembly with everything unrelated to job orchestration dropped.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/v1/jobs", jobs::router())
        .merge(health::router())
        .with_state(state)
}
