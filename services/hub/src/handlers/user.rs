//! User handler (§4.2.3): persists a user/credential pair pushed by a
//! terminal via `senduser`.

use chrono::{NaiveDateTime, Utc};
use serde_json::Value;
use tm20_protocol::inbound::SendUserMessage;
use tm20_protocol::response;
use uuid::Uuid;

use crate::event_bus::HubEvent;
use crate::repo::{credentials, users};
use crate::state::AppState;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_wire_time(s: &Option<String>) -> Option<chrono::DateTime<Utc>> {
    s.as_deref()
        .and_then(|s| NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok())
        .map(|naive| naive.and_utc())
}

pub async fn handle_senduser(state: &AppState, terminal_id: Uuid, msg: &SendUserMessage) -> Value {
    let starttime = parse_wire_time(&msg.starttime);
    let endtime = parse_wire_time(&msg.endtime);

    let user = match users::upsert_from_terminal(
        &state.pool,
        terminal_id,
        msg.enrollid,
        msg.name.as_deref(),
        msg.admin.value() as i16,
        msg.group.map(|g| g as i32),
        starttime,
        endtime,
    )
    .await
    {
        Ok(row) => row,
        Err(err) => {
            tracing::error!(error = %err, sn = %msg.sn, "failed to upsert user");
            return response::senduser_failure(1);
        }
    };

    if let Err(err) = credentials::upsert(&state.pool, user.id, msg.backupnum.value() as i16, &msg.record).await {
        tracing::error!(error = %err, sn = %msg.sn, "failed to upsert credential");
        return response::senduser_failure(1);
    }

    state.event_bus.publish(HubEvent::UserCreated { terminal_sn: msg.sn.clone(), enrollid: msg.enrollid });
    response::senduser_success(&response::format_cloudtime(Utc::now()))
}
