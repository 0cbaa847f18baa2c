//! Terminal Session Core (§4.2): the WebSocket loop a connected TM20
//! device runs for the lifetime of its TCP connection, dispatching each
//! of the four inbound command verbs and applying an optional whitelist
//! check inside the registration handler itself.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tracing::{info, warn};

use tm20_protocol::inbound::{self, CommandFrame};
use tm20_protocol::outbound::OutboundCommand;
use tm20_protocol::response::to_text;

use crate::event_bus::HubEvent;
use crate::handlers::registration::RegistrationOutcome;
use crate::handlers::{attendance, qrcode, registration, response, user};
use crate::registry::{SessionHandle, OUTBOUND_MAILBOX_CAPACITY};
use crate::repo::terminals;
use crate::session::SessionState;
use crate::state::AppState;

pub async fn ws_terminal_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_terminal_socket(socket, state))
}

async fn handle_terminal_socket(mut socket: WebSocket, state: AppState) {
    let connection_timeout = state.settings.connection_timeout;
    let mut phase = SessionState::Connecting;

    let first_text = match tokio::time::timeout(connection_timeout, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        _ => {
            warn!(phase = phase.as_str(), "no reg frame within connection timeout, closing");
            return;
        }
    };
    phase = SessionState::Connected;

    let reg_msg = match inbound::parse_command(&first_text) {
        Ok(CommandFrame::Reg(msg)) => msg,
        Ok(_) => {
            warn!("first frame was not a reg command");
            return;
        }
        Err(err) => {
            warn!(error = %err, "malformed first frame");
            return;
        }
    };

    let sn = reg_msg.sn.clone();
    let (mailbox_tx, mut mailbox_rx) = mpsc::channel::<String>(OUTBOUND_MAILBOX_CAPACITY);
    let handle = SessionHandle::new(sn.clone(), mailbox_tx);

    let outcome = registration::handle_reg(&state, &handle, &reg_msg).await;
    let (reply, accepted) = match outcome {
        RegistrationOutcome::Accepted { response } => (response, true),
        RegistrationOutcome::Rejected { response } => (response, false),
    };
    if socket.send(Message::Text(to_text(&reply).into())).await.is_err() {
        return;
    }
    if !accepted {
        info!(sn = %sn, "registration rejected, closing socket");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    phase = SessionState::Registered;

    if let Some(_previous) = state.registry.register(handle.clone()) {
        warn!(sn = %sn, "a prior session for this serial number was still registered; replacing it");
    }
    state.metrics.total_connections.incr();
    state.metrics.active_connections.incr();
    state.event_bus.publish(HubEvent::DeviceConnected { sn: sn.clone() });
    phase = SessionState::Online;
    info!(sn = %sn, phase = phase.as_str(), "terminal session established");

    let mut heartbeat = tokio::time::interval(state.settings.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            recv = tokio::time::timeout(connection_timeout, socket.recv()) => {
                match recv {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        handle.touch();
                        state.metrics.record_message(&sn);
                        if let Err(err) = dispatch_frame(&state, &handle, &sn, &text, &mut socket).await {
                            warn!(sn = %sn, error = %err, "error handling frame, closing session");
                            break;
                        }
                    }
                    Ok(Some(Ok(Message::Ping(data)))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                        info!(sn = %sn, "terminal closed connection");
                        break;
                    }
                    Err(_) => {
                        warn!(sn = %sn, "connection timed out");
                        state.event_bus.publish(HubEvent::DeviceTimeout { sn: sn.clone() });
                        break;
                    }
                    Ok(Some(Err(err))) => {
                        warn!(sn = %sn, error = %err, "websocket error");
                        break;
                    }
                    Ok(Some(Ok(_))) => {}
                }
            }
            _ = heartbeat.tick() => {
                // Keepalive probe: a terminal with nothing to say otherwise
                // sits silent between log batches, so the hub polls gettime
                // to detect a half-open socket before connection_timeout.
                let probe = OutboundCommand::GetTime {};
                if socket.send(Message::Text(probe.to_json().into())).await.is_err() {
                    break;
                }
            }
            Some(frame) = mailbox_rx.recv() => {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
                state.metrics.messages_out.incr();
            }
        }
    }

    phase = SessionState::Closed;
    state.registry.unregister(&sn);
    state.metrics.active_connections.decr();
    state.metrics.total_disconnections.incr();
    state.event_bus.publish(HubEvent::DeviceDisconnected { sn: sn.clone() });
    let _ = terminals::set_active(&state.pool, &sn, false).await;
    info!(sn = %sn, phase = phase.as_str(), "terminal session ended");
}

async fn dispatch_frame(
    state: &AppState,
    handle: &SessionHandle,
    sn: &str,
    text: &str,
    socket: &mut WebSocket,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if inbound::is_response_frame(text) {
        if let Ok(value) = serde_json::from_str(text) {
            response::handle_ret(state, sn, value).await;
        }
        return Ok(());
    }

    let frame = match inbound::parse_command(text) {
        Ok(frame) => frame,
        Err(err) => {
            // Per ProtocolError's contract: log and drop, never close the socket.
            warn!(sn = %sn, error = %err, "dropping malformed frame");
            return Ok(());
        }
    };

    let reply = match frame {
        CommandFrame::Reg(msg) => {
            let outcome = registration::handle_reg(state, handle, &msg).await;
            match outcome {
                RegistrationOutcome::Accepted { response } | RegistrationOutcome::Rejected { response } => response,
            }
        }
        CommandFrame::SendLog(msg) => {
            let Some(terminal) = terminals::get_by_sn(&state.pool, sn).await? else {
                return Ok(());
            };
            attendance::handle_sendlog(state, terminal.id, &msg).await
        }
        CommandFrame::SendUser(msg) => {
            let Some(terminal) = terminals::get_by_sn(&state.pool, sn).await? else {
                return Ok(());
            };
            user::handle_senduser(state, terminal.id, &msg).await
        }
        CommandFrame::SendQrCode(msg) => {
            let Some(terminal) = terminals::get_by_sn(&state.pool, sn).await? else {
                return Ok(());
            };
            qrcode::handle_sendqrcode(state, terminal.id, &msg).await
        }
    };

    socket.send(Message::Text(to_text(&reply).into())).await?;
    Ok(())
}
