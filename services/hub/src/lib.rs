pub mod access_control;
pub mod attendance_engine;
pub mod config;
pub mod db;
pub mod enrollid;
pub mod event_bus;
pub mod handlers;
pub mod http;
pub mod inout;
pub mod kv;
pub mod metrics;
pub mod pending;
pub mod registry;
pub mod repo;
pub mod session;
pub mod state;
pub mod third_party;
pub mod user_sync_engine;
pub mod ws_terminal;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;

/// Builds the hub's router (§7): one WebSocket upgrade endpoint for
/// terminals, health checks, a metrics snapshot, and the sync trigger
/// endpoints an operator or external cron calls since the hub has no
/// scheduler of its own.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/v1/terminal", get(ws_terminal::ws_terminal_handler))
        .route("/healthz", get(http::health::healthz))
        .route("/readyz", get(http::health::readyz))
        .route("/api/v1/metrics", get(http::metrics::get_metrics))
        .route("/api/v1/events", get(http::dashboard::dashboard_sse))
        .route("/api/v1/events/snapshot", get(http::dashboard::events_snapshot))
        .route("/api/v1/sync/:config_id/run", post(http::sync::run_attendance_sync))
        .route("/api/v1/sync/retry-failed", post(http::sync::retry_failed_attendance))
        .route("/api/v1/sync/reset-failed", post(http::sync::reset_failed_attendance))
        .route("/api/v1/sync/purge-exhausted-failures", post(http::sync::purge_exhausted_failures))
        .route("/api/v1/sync/users/pull", post(http::sync::pull_users))
        .route("/api/v1/sync/users/:sn/push", post(http::sync::push_users))
        .with_state(state)
}
