use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// Liveness: the process is up and serving requests.
pub async fn healthz() -> impl IntoResponse {
    "ok"
}

/// Readiness (§A.4): the DB, Redis and event bus are all reachable. A
/// load balancer should stop routing traffic here on a non-200.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_healthy().await {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"}))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"status": "not ready"}))).into_response()
    }
}
