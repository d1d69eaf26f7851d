//! # Health Check Handler
//!
//! Readiness probe for load balancers and monitoring. It asks the document
//! store for a trivial answer, because a shop whose store is gone cannot
//! serve a single page: every request needs its session record.
//!
//! The route sits outside the context composer and never touches the
//! session, so probes don't create sessions or CSRF secrets.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

/// Health check endpoint
///
/// ## Route
/// GET /health
///
/// ## Response
/// `200 OK` while the store answers:
/// ```json
/// { "status": "healthy", "service": "course-shop", "store": "ok" }
/// ```
///
/// `503 Service Unavailable` otherwise, with `"status": "degraded"` and
/// `"store": "unavailable"`. The failure itself is logged, not returned.
///
/// ## Why not return AppResult?
/// A failed ping is an expected answer of this route, not an error, and the
/// body must stay JSON rather than the HTML error page.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "course-shop",
                "store": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: document store did not answer");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": "course-shop",
                    "store": "unavailable"
                })),
            )
        }
    }
}
