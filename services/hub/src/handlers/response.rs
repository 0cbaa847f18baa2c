//! Correlates an inbound `ret` frame (a terminal acking a command the hub
//! pushed, e.g. `setusername`, `opendoor`) against the pending-context map
//! registered when that command was sent.

use serde_json::Value;

use crate::event_bus::HubEvent;
use crate::state::AppState;

pub async fn handle_ret(state: &AppState, sn: &str, value: Value) {
    let Some(verb) = value.get("ret").and_then(Value::as_str).map(str::to_owned) else {
        tracing::warn!(sn = %sn, "ret frame missing ret field");
        return;
    };

    let result = value.get("result").and_then(Value::as_bool).unwrap_or(false);
    let resolved = state.pending.resolve(sn, &verb, value.clone());

    if !resolved {
        tracing::debug!(sn = %sn, verb = %verb, "unsolicited ret frame (no pending waiter)");
    }

    state.event_bus.publish(HubEvent::CommandResponse { sn: sn.to_owned(), command: verb, result });
    if result {
        state.metrics.commands_success.incr();
    } else {
        state.metrics.commands_failed.incr();
    }
}
