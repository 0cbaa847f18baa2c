//! Sync trigger endpoints (§4.6/§4.7): the hub has no built-in scheduler
//! (Non-goal), so an operator or an external cron hits these to run one
//! round of attendance/user sync against a third-party config.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::attendance_engine;
use crate::http::response::{bad_request, internal_error};
use crate::repo::terminals;
use crate::state::AppState;
use crate::user_sync_engine;

pub async fn run_attendance_sync(State(state): State<AppState>, Path(config_id): Path<Uuid>) -> impl IntoResponse {
    match attendance_engine::sync_config(&state, config_id).await {
        Ok(result) => Json(serde_json::json!({
            "config_name": result.config_name,
            "sent": result.sent,
            "failed": result.failed,
        }))
        .into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

pub async fn retry_failed_attendance(State(state): State<AppState>) -> impl IntoResponse {
    let results = attendance_engine::retry_failed(&state, None).await;
    Json(serde_json::json!({ "configs_retried": results.len() })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ResetFailedBody {
    pub terminal_id: Uuid,
}

pub async fn reset_failed_attendance(State(state): State<AppState>, Json(body): Json<ResetFailedBody>) -> impl IntoResponse {
    match attendance_engine::reset_failed(&state, body.terminal_id).await {
        Ok(count) => Json(serde_json::json!({ "reset": count })).into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CleanupBody {
    #[serde(default = "default_cleanup_days")]
    pub older_than_days: i32,
}

fn default_cleanup_days() -> i32 {
    30
}

pub async fn purge_exhausted_failures(State(state): State<AppState>, Json(body): Json<CleanupBody>) -> impl IntoResponse {
    match attendance_engine::purge_exhausted_failures(&state, body.older_than_days).await {
        Ok(count) => Json(serde_json::json!({ "deleted": count })).into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UserSyncQuery {
    pub sn: String,
    pub config_id: Uuid,
}

pub async fn pull_users(State(state): State<AppState>, Json(query): Json<UserSyncQuery>) -> impl IntoResponse {
    let Ok(Some(terminal)) = terminals::get_by_sn(&state.pool, &query.sn).await else {
        return bad_request("unknown terminal sn").into_response();
    };
    match user_sync_engine::pull_users(&state, &query.sn, terminal.id, query.config_id).await {
        Ok(result) => Json(serde_json::json!({
            "created": result.created,
            "updated": result.updated,
            "skipped": result.skipped,
            "errors": result.errors,
        }))
        .into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

pub async fn push_users(State(state): State<AppState>, Path(sn): Path<String>) -> impl IntoResponse {
    let Ok(Some(terminal)) = terminals::get_by_sn(&state.pool, &sn).await else {
        return bad_request("unknown terminal sn").into_response();
    };
    if !state.registry.is_connected(&sn) {
        return bad_request("terminal is not currently connected").into_response();
    }
    let result = user_sync_engine::push_pending_users(&state, &sn, terminal.id).await;
    Json(serde_json::json!({ "sent": result.sent, "failed": result.failed })).into_response()
}
