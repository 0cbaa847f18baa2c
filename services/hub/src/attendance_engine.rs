//! Attendance Sync Engine (§4.6): drains pending attendance logs to each
//! active third-party config, backs off retries exponentially, and lets a
//! log settle into the terminal `failed` state once it exhausts its
//! retries. The hub has no built-in scheduler (§1 Non-goals), so these are
//! invoked from the `/api/v1/sync/*` HTTP surface instead of a cron beat.

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::event_bus::HubEvent;
use crate::repo::attendance::{self, AttendanceLogRow};
use crate::repo::third_party;
use crate::state::AppState;
use crate::third_party::{ThirdPartyClient, ThirdPartyError, ThirdPartyOutcome};

pub const MAX_RETRY: i32 = 5;
pub const BACKOFF_MINUTES: [i64; 5] = [1, 5, 15, 60, 240];

#[derive(Debug, Default, Clone)]
pub struct SyncResult {
    pub config_name: String,
    pub sent: usize,
    pub failed: usize,
}

/// Backoff before attempt number `attempt` (1-indexed) is eligible for
/// retry, per §4.6's `{1, 5, 15, 60, 240}` minute schedule. Attempts past
/// the table length reuse the last (longest) interval.
pub fn backoff_for_attempt(attempt: i32) -> Duration {
    let idx = (attempt - 1).clamp(0, BACKOFF_MINUTES.len() as i32 - 1) as usize;
    Duration::from_secs(BACKOFF_MINUTES[idx] as u64 * 60)
}

fn attendance_payload(log: &AttendanceLogRow) -> serde_json::Value {
    json!({
        "terminal_id": log.terminal_id,
        "enrollid": log.enrollid,
        "timestamp": log.punch_time.to_rfc3339(),
        "access_granted": log.access_granted,
        "raw": log.raw_payload,
    })
}

enum Batch {
    /// Never-attempted rows (§4.6's primary drain-pending pass) -- no
    /// backoff to honor since nothing has failed yet.
    Pending,
    /// Failed rows past their backoff window (§4.6's retry-failed pass).
    /// Excludes rows that already exhausted `MAX_RETRY`.
    Retry,
}

async fn drain_config(state: &AppState, config_id: Uuid, which: Batch) -> Result<SyncResult, ThirdPartyError> {
    let Ok(Some(config)) = third_party::get(&state.pool, config_id).await else {
        return Ok(SyncResult::default());
    };
    let config_name = config.name.clone();
    let client = ThirdPartyClient::new(config)?;

    let mappings = third_party::list_mappings_for_config(&state.pool, config_id)
        .await
        .unwrap_or_default();

    let mut result = SyncResult { config_name, ..Default::default() };

    for mapping in mappings.into_iter().filter(|m| m.sync_attendance) {
        loop {
            let batch_size = state.settings.attendance_batch_size as i64;
            let batch = match which {
                Batch::Pending => attendance::select_pending_batch(&state.pool, mapping.terminal_id, batch_size).await,
                Batch::Retry => attendance::select_retry_batch(&state.pool, mapping.terminal_id, MAX_RETRY, batch_size).await,
            }
            .unwrap_or_default();
            if batch.is_empty() {
                break;
            }

            for log in &batch {
                match send_one(&client, log).await {
                    SendOutcome::Sent => {
                        let _ = attendance::mark_sent(&state.pool, log.id).await;
                        result.sent += 1;
                    }
                    SendOutcome::RateLimited(retry_after) => {
                        let _ = attendance::defer_retry(&state.pool, log.id, retry_after, "rate limited by third party").await;
                        result.failed += 1;
                    }
                    SendOutcome::Failed => {
                        let _ = attendance::mark_failed(&state.pool, log.id, "third-party rejected attendance log").await;
                        result.failed += 1;
                    }
                }
            }
        }
        let _ = third_party::touch_last_attendance_sync(&state.pool, mapping.id).await;
    }

    state.event_bus.publish(HubEvent::MetricsUpdate);
    Ok(result)
}

pub async fn sync_config(state: &AppState, config_id: Uuid) -> Result<SyncResult, ThirdPartyError> {
    drain_config(state, config_id, Batch::Pending).await
}

/// Re-sends only logs whose backoff window (based on `sync_attempts`) has
/// elapsed since their last update (§4.6).
pub async fn retry_config(state: &AppState, config_id: Uuid) -> Result<SyncResult, ThirdPartyError> {
    drain_config(state, config_id, Batch::Retry).await
}

enum SendOutcome {
    Sent,
    Failed,
    RateLimited(Duration),
}

/// Default wait when a 429 carries no `Retry-After` header.
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

async fn send_one(client: &ThirdPartyClient, log: &AttendanceLogRow) -> SendOutcome {
    match client.post_attendance(&attendance_payload(log)).await {
        Ok(ThirdPartyOutcome::Success(_)) => SendOutcome::Sent,
        Ok(ThirdPartyOutcome::RateLimited { retry_after }) => {
            SendOutcome::RateLimited(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF))
        }
        Ok(ThirdPartyOutcome::Transient | ThirdPartyOutcome::AuthError | ThirdPartyOutcome::ClientError { .. }) | Err(_) => {
            SendOutcome::Failed
        }
    }
}

pub async fn sync_all(state: &AppState) -> Vec<SyncResult> {
    let configs = third_party::list_active(&state.pool).await.unwrap_or_default();
    let mut results = Vec::new();
    for config in configs.into_iter().filter(|c| !c.attendance_endpoint.is_empty()) {
        if let Ok(result) = sync_config(state, config.id).await {
            results.push(result);
        }
    }
    results
}

pub async fn retry_failed(state: &AppState, config_id: Option<Uuid>) -> Vec<SyncResult> {
    match config_id {
        Some(id) => retry_config(state, id).await.into_iter().collect(),
        None => {
            let configs = third_party::list_active(&state.pool).await.unwrap_or_default();
            let mut results = Vec::new();
            for config in configs.into_iter().filter(|c| !c.attendance_endpoint.is_empty()) {
                if let Ok(result) = retry_config(state, config.id).await {
                    results.push(result);
                }
            }
            results
        }
    }
}

pub async fn reset_failed(state: &AppState, terminal_id: Uuid) -> Result<u64, sqlx::Error> {
    attendance::reset_failed(&state.pool, terminal_id).await
}

pub async fn purge_exhausted_failures(state: &AppState, older_than_days: i32) -> Result<u64, sqlx::Error> {
    attendance::purge_exhausted_failures(&state.pool, MAX_RETRY, older_than_days).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_documented_schedule() {
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(60));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(5 * 60));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(15 * 60));
        assert_eq!(backoff_for_attempt(4), Duration::from_secs(60 * 60));
        assert_eq!(backoff_for_attempt(5), Duration::from_secs(240 * 60));
    }

    #[test]
    fn backoff_past_table_reuses_longest_interval() {
        assert_eq!(backoff_for_attempt(9), Duration::from_secs(240 * 60));
    }

    #[test]
    fn backoff_clamps_nonpositive_attempt_to_first_interval() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(60));
    }
}
