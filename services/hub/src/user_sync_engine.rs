//! User Sync Engine (§4.7): bidirectional sync between a third-party
//! system and `biometric_users` -- pull new/changed users down into the
//! hub, push `pending_sync` users out to the physical terminal over the
//! in-process `DeviceRegistry` mailbox.

use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use tm20_protocol::outbound::{OutboundCommand, UserNameEntry};

use crate::enrollid;
use crate::event_bus::HubEvent;
use crate::repo::third_party;
use crate::repo::users::{self, UserRow};
use crate::state::AppState;
use crate::third_party::{ThirdPartyClient, ThirdPartyError, ThirdPartyOutcome};

const PUSH_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Clone)]
pub struct PullResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct PushResult {
    pub sent: usize,
    pub failed: usize,
}

/// One entry in the third party's user list response. Adapters differ in
/// exact shape, so this only requires the fields the hub actually needs;
/// anything else in the payload is ignored.
#[derive(Debug, serde::Deserialize)]
struct RemoteUser {
    external_id: String,
    #[serde(default)]
    fullname: Option<String>,
}

fn parse_remote_users(body: &Value) -> Vec<RemoteUser> {
    let list = body.get("users").or_else(|| body.get("data")).unwrap_or(body);
    serde_json::from_value::<Vec<RemoteUser>>(list.clone()).unwrap_or_default()
}

/// Pulls the user list from a third-party config and upserts each one
/// against `(terminal_id, external_id)`. Mirrors
/// `UserSyncService.fetch_and_sync_users` / `_upsert_user`: an unseen
/// `external_id` is created with a freshly allocated enrollid; a known
/// one is refreshed in place. The hub always marks a changed row
/// `pending_sync` so the push half later loads it onto the terminal.
pub async fn pull_users(state: &AppState, sn: &str, terminal_id: Uuid, config_id: Uuid) -> Result<PullResult, ThirdPartyError> {
    let Ok(Some(config)) = third_party::get(&state.pool, config_id).await else {
        return Ok(PullResult { errors: vec!["unknown third-party config".into()], ..Default::default() });
    };
    let client = ThirdPartyClient::new(config)?;

    let remote_users = match client.get_users().await? {
        ThirdPartyOutcome::Success(body) => parse_remote_users(&body),
        ThirdPartyOutcome::AuthError => {
            return Ok(PullResult { errors: vec!["third-party auth rejected".into()], ..Default::default() })
        }
        ThirdPartyOutcome::RateLimited { .. } | ThirdPartyOutcome::Transient => {
            return Ok(PullResult { errors: vec!["third-party temporarily unavailable".into()], ..Default::default() })
        }
        ThirdPartyOutcome::ClientError { status } => {
            return Ok(PullResult { errors: vec![format!("third-party returned {status}")], ..Default::default() })
        }
    };

    let mut result = PullResult::default();
    if remote_users.is_empty() {
        return Ok(result);
    }

    let mut taken = users::list_enrollids(&state.pool, terminal_id).await.unwrap_or_default();

    for remote in remote_users {
        let existing = users::get_by_terminal_and_external_id(&state.pool, terminal_id, &remote.external_id).await;
        let enrollid = match &existing {
            Ok(Some(row)) => row.enrollid,
            _ => {
                let next = enrollid::smallest_free_enrollid(&taken);
                taken.push(next);
                next
            }
        };

        match users::upsert_from_third_party(
            &state.pool,
            terminal_id,
            &remote.external_id,
            enrollid,
            remote.fullname.as_deref(),
            config_id,
        )
        .await
        {
            Ok(_) => match existing {
                Ok(Some(_)) => result.updated += 1,
                _ => result.created += 1,
            },
            Err(err) => result.errors.push(format!("{}: {err}", remote.external_id)),
        }
    }

    if let Ok(mappings) = third_party::list_mappings_for_terminal(&state.pool, terminal_id).await {
        if let Some(mapping) = mappings.into_iter().find(|m| m.config_id == config_id) {
            let _ = third_party::touch_last_user_sync(&state.pool, mapping.id).await;
        }
    }

    state.event_bus.publish(HubEvent::UserSynced { terminal_sn: sn.to_owned(), enrollid: 0 });
    Ok(result)
}

/// Pushes every `pending_sync` user for a terminal down as a single
/// `setusername` batch (§6), per `_send_users_batch_to_terminal`'s "one
/// batch command, not one per user" choice. Waits for the terminal's
/// `ret=setusername` before marking rows synced, since the hub's pending
/// context map is the only place that confirmation can be observed.
pub async fn push_pending_users(state: &AppState, sn: &str, terminal_id: Uuid) -> PushResult {
    let pending = users::list_pending_sync(&state.pool, terminal_id).await.unwrap_or_default();
    if pending.is_empty() {
        return PushResult::default();
    }

    let entries: Vec<UserNameEntry> = pending
        .iter()
        .map(|u| UserNameEntry {
            enrollid: u.enrollid,
            name: u.name.clone().unwrap_or_else(|| format!("User{}", u.enrollid)),
        })
        .collect();
    let command = OutboundCommand::set_user_name_batch(entries);

    let waiter = state.pending.register(sn, "setusername", PUSH_REPLY_TIMEOUT);
    if state.registry.send_to_device(sn, command.to_json()).await.is_err() {
        return PushResult { sent: 0, failed: pending.len() };
    }
    state.event_bus.publish(HubEvent::CommandSent { sn: sn.to_owned(), command: "setusername".into() });

    match tokio::time::timeout(PUSH_REPLY_TIMEOUT, waiter).await {
        Ok(Ok(reply)) if reply.get("result").and_then(Value::as_bool).unwrap_or(false) => {
            mark_users_synced(state, &pending).await;
            state.event_bus.publish(HubEvent::CommandResponse { sn: sn.to_owned(), command: "setusername".into(), result: true });
            PushResult { sent: pending.len(), failed: 0 }
        }
        Ok(Ok(_)) => {
            // Terminal replied but rejected the batch -- mark the rows
            // `error` rather than leaving them `pending_sync` forever.
            mark_users_errored(state, &pending).await;
            state.event_bus.publish(HubEvent::CommandResponse { sn: sn.to_owned(), command: "setusername".into(), result: false });
            PushResult { sent: 0, failed: pending.len() }
        }
        Ok(Err(_)) | Err(_) => {
            // No reply ever arrived (timeout, or the waiter was dropped).
            // Rows stay `pending_sync` so the next push attempts them again.
            state.event_bus.publish(HubEvent::CommandTimeout { sn: sn.to_owned(), command: "setusername".into() });
            PushResult { sent: 0, failed: pending.len() }
        }
    }
}

async fn mark_users_synced(state: &AppState, rows: &[UserRow]) {
    for row in rows {
        let _ = users::set_sync_status(&state.pool, row.id, "synced_to_terminal").await;
    }
}

async fn mark_users_errored(state: &AppState, rows: &[UserRow]) {
    for row in rows {
        let _ = users::set_sync_status(&state.pool, row.id, "error").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_users_under_a_users_key() {
        let body = json!({"users": [{"external_id": "e1", "fullname": "Alice"}]});
        let parsed = parse_remote_users(&body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].external_id, "e1");
    }

    #[test]
    fn parses_a_bare_array_body() {
        let body = json!([{"external_id": "e2"}]);
        let parsed = parse_remote_users(&body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].fullname, None);
    }

    #[test]
    fn malformed_body_yields_empty_list_rather_than_panicking() {
        let body = json!({"unexpected": "shape"});
        assert!(parse_remote_users(&body).is_empty());
    }
}
