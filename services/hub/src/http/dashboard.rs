//! Dashboard event stream (§4.4): pushes `HubEvent`s to any connected
//! dashboard client over Server-Sent Events, with an explicit
//! dropped-event counter on the lagged path since `EventBus` already
//! tracks how many events a slow subscriber missed.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::event_bus::HubEvent;
use crate::state::AppState;

/// Snapshot of the last (up to) 1,000 events, oldest first, for a
/// dashboard client joining after some history has already happened.
pub async fn events_snapshot(State(state): State<AppState>) -> Json<Vec<HubEvent>> {
    Json(state.event_bus.snapshot())
}

fn event_name(event: &HubEvent) -> &'static str {
    match event {
        HubEvent::DeviceConnected { .. } => "device_connected",
        HubEvent::DeviceRegistered { .. } => "device_registered",
        HubEvent::DeviceDisconnected { .. } => "device_disconnected",
        HubEvent::DeviceTimeout { .. } => "device_timeout",
        HubEvent::AttendanceLogReceived { .. } => "attendance_log_received",
        HubEvent::AttendanceLogBatch { .. } => "attendance_log_batch",
        HubEvent::UserSynced { .. } => "user_synced",
        HubEvent::UserCreated { .. } => "user_created",
        HubEvent::UserDeleted { .. } => "user_deleted",
        HubEvent::CommandSent { .. } => "command_sent",
        HubEvent::CommandResponse { .. } => "command_response",
        HubEvent::CommandTimeout { .. } => "command_timeout",
        HubEvent::ServerStarted => "server_started",
        HubEvent::ServerStopped => "server_stopped",
        HubEvent::MetricsUpdate => "metrics_update",
        HubEvent::ErrorOccurred { .. } => "error_occurred",
    }
}

pub async fn dashboard_sse(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_bus.subscribe();
    let event_bus = state.event_bus.clone();
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            let name = event_name(&event);
            serde_json::to_string(&event).ok().map(|json| Ok(Event::default().event(name).data(json)))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            event_bus.record_dropped(n);
            Some(Ok(Event::default().event("dropped").data(n.to_string())))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"))
}
