//! Registration handler (§4.2.1): first contact and every subsequent
//! `reg` frame a terminal sends after reconnecting.

use chrono::Utc;
use serde_json::Value;
use tm20_protocol::inbound::RegMessage;
use tm20_protocol::response;

use crate::event_bus::HubEvent;
use crate::registry::SessionHandle;
use crate::repo::{commands, terminals};
use crate::state::AppState;

pub enum RegistrationOutcome {
    Accepted { response: Value },
    Rejected { response: Value },
}

pub async fn handle_reg(state: &AppState, session: &SessionHandle, msg: &RegMessage) -> RegistrationOutcome {
    if state.settings.require_whitelist {
        let existing = terminals::get_by_sn(&state.pool, &msg.sn).await.ok().flatten();
        let whitelisted = existing.as_ref().is_some_and(|t| t.is_whitelisted);
        if !whitelisted {
            tracing::warn!(sn = %msg.sn, "rejected registration: not whitelisted");
            return RegistrationOutcome::Rejected {
                response: response::reg_rejected("Terminal not authorized"),
            };
        }
    }

    let cpusn = msg.cpusn.clone().unwrap_or_default();
    if let Err(err) = terminals::upsert_from_registration(&state.pool, &msg.sn, &cpusn, &msg.devinfo).await {
        tracing::error!(sn = %msg.sn, error = %err, "failed to persist terminal registration");
        return RegistrationOutcome::Rejected {
            response: response::reg_rejected("internal error"),
        };
    }

    state.event_bus.publish(HubEvent::DeviceRegistered { sn: msg.sn.clone() });

    // Drain anything queued while the terminal was offline (§8, "Command
    // queue drain on reconnect"). Each payload is the outbound command's
    // own JSON, stored verbatim at enqueue time.
    if let Ok(Some(terminal)) = terminals::get_by_sn(&state.pool, &msg.sn).await {
        if let Ok(pending) = commands::list_pending(&state.pool, terminal.id).await {
            for queued in pending {
                let text = serde_json::to_string(&queued.payload).unwrap_or_default();
                if session.send(text).await.is_ok() {
                    let _ = commands::mark_sent(&state.pool, queued.id).await;
                }
            }
        }
    }

    RegistrationOutcome::Accepted {
        response: response::reg_success(&response::format_cloudtime(Utc::now())),
    }
}
