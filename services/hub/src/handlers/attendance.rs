//! Attendance handler (§4.2.2): a `sendlog` batch is persisted in one
//! transaction -- all rows commit together or none do (§5, §8) -- with the
//! hub, never the terminal, deciding `inout` and the access verdict.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Value};
use tm20_protocol::inbound::SendLogMessage;
use tm20_protocol::response;
use uuid::Uuid;

use crate::access_control::{self, AccessDecision, UserAccessInfo};
use crate::event_bus::HubEvent;
use crate::inout::{self, LastPunch};
use crate::repo::{attendance, users};
use crate::state::AppState;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub async fn handle_sendlog(state: &AppState, terminal_id: Uuid, msg: &SendLogMessage) -> Value {
    let started = std::time::Instant::now();
    let mut last_access = AccessDecision::Granted;
    // Tracks the inout flip within this batch, since none of these rows
    // are committed yet for `attendance::last_punch` to see.
    let mut in_batch_last: HashMap<i64, LastPunch> = HashMap::new();

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!(error = %err, sn = %msg.sn, "failed to open attendance batch transaction");
            return response::sendlog_failure(1);
        }
    };

    for record in &msg.record {
        let punch_time = NaiveDateTime::parse_from_str(&record.time, TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(|_| Utc::now());

        let user = match users::get_by_terminal_and_enrollid(&state.pool, terminal_id, record.enrollid).await {
            Ok(row) => row,
            Err(err) => {
                tracing::error!(error = %err, "failed to look up user for attendance log");
                None
            }
        };

        let access_info = user.as_ref().map(|u| UserAccessInfo {
            is_enabled: u.is_enabled,
            starttime: u.starttime,
            endtime: u.endtime,
        });
        let decision = access_control::decide(access_info.as_ref(), punch_time);
        last_access = decision;

        let last_punch = match in_batch_last.get(&record.enrollid) {
            Some(last) => Some(LastPunch { inout: last.inout, punch_time: last.punch_time }),
            None => attendance::last_punch(&state.pool, terminal_id, record.enrollid)
                .await
                .ok()
                .flatten()
                .map(|row| LastPunch { inout: row.inout, punch_time: row.punch_time }),
        };
        let inferred_inout = inout::infer_inout(last_punch.as_ref(), punch_time, state.settings.sync_session_window);
        in_batch_last.insert(record.enrollid, LastPunch { inout: inferred_inout, punch_time });

        let raw_payload = json!({
            "enrollid": record.enrollid,
            "time": record.time,
            "mode": record.mode,
            "reported_inout": record.inout,
            "event": record.event,
            "temperature": record.temperature,
        });

        let insert_result = attendance::insert_log(
            &mut *tx,
            terminal_id,
            user.as_ref().map(|u| u.id),
            record.enrollid,
            punch_time,
            record.mode.map(|m| m as i32),
            inferred_inout,
            record.event.map(|e| e as i32),
            record.temperature,
            record.image.as_deref(),
            raw_payload,
            decision.is_granted(),
        )
        .await;

        if let Err(err) = insert_result {
            tracing::error!(error = %err, sn = %msg.sn, "failed to persist attendance log, rolling back batch");
            let _ = tx.rollback().await;
            return response::sendlog_failure(1);
        }
    }

    if let Err(err) = tx.commit().await {
        tracing::error!(error = %err, sn = %msg.sn, "failed to commit attendance batch");
        return response::sendlog_failure(1);
    }

    state.metrics.record_logs(&msg.sn, msg.record.len() as u64);
    state.event_bus.publish(HubEvent::AttendanceLogBatch {
        sn: msg.sn.clone(),
        count: msg.record.len(),
        latency_ms: started.elapsed().as_millis() as u64,
    });

    let access_byte: u8 = if last_access.is_granted() { 1 } else { 0 };
    response::sendlog_success(msg.record.len(), msg.logindex, &response::format_cloudtime(Utc::now()), access_byte)
}
