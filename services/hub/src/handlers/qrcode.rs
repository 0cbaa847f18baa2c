//! QR-code handler (§4.2.4): a terminal presents a scanned code's payload
//! as the `record` string; the hub resolves it against a user's
//! `external_id` and returns an access verdict the same way a fingerprint
//! or card match would.

use serde_json::Value;
use tm20_protocol::inbound::SendQrCodeMessage;
use tm20_protocol::response;
use uuid::Uuid;

use crate::access_control::{self, UserAccessInfo};
use crate::repo::users;
use crate::state::AppState;

pub async fn handle_sendqrcode(state: &AppState, terminal_id: Uuid, msg: &SendQrCodeMessage) -> Value {
    let user = match users::get_by_terminal_and_external_id(&state.pool, terminal_id, &msg.record).await {
        Ok(row) => row,
        Err(err) => {
            tracing::error!(error = %err, sn = %msg.sn, "failed to look up qr code");
            None
        }
    };

    let access_info = user.as_ref().map(|u| UserAccessInfo {
        is_enabled: u.is_enabled,
        starttime: u.starttime,
        endtime: u.endtime,
    });
    let decision = access_control::decide(access_info.as_ref(), chrono::Utc::now());

    match (decision.is_granted(), &user) {
        (true, Some(user)) => response::sendqrcode_granted(
            user.enrollid,
            user.name.as_deref().unwrap_or(""),
            "access granted",
        ),
        _ => response::sendqrcode_denied("access denied"),
    }
}
