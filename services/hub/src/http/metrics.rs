use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// Snapshot of every counter, gauge and histogram the hub tracks, plus
/// per-device message/log breakdowns (§4.8). Intended for a dashboard or
/// an ops dashboard poll, not for Prometheus scraping -- there is no
/// exposition-format encoder here, just the JSON the metrics module
/// already produces for its own KV mirror.
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
