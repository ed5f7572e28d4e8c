// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client Fan-out (spec.md §4.6 / C6): one downstream WebSocket endpoint
//! per robot. Grounded on the teacher's `transport/ws.rs::ws_handler` /
//! `handle_ws` (upgrade, look up an entry by path id, fan events from a
//! shared source to the socket, forward socket frames back).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::inventory::{MapStore, RobotInventory};
use crate::manager::{ManagerEvent, RobotManager};
use crate::state::GatewayState;
use crate::transport::protocol::{parse_client_frame, ClientFrame, ServerFrame};

/// `GET /ws/robots/{robotId}` — per-robot downstream WebSocket upgrade.
pub async fn ws_handler<I, M>(
    State(state): State<Arc<GatewayState<I, M>>>,
    Path(robot_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    ws.on_upgrade(move |socket| handle_ws(socket, state, robot_id))
}

/// Per-connection handler: on accept, look up the robot's Manager. Unknown
/// ids get a single error frame then close (spec.md §4.6, S5). Otherwise
/// attach a `channel-data` forwarder and a command-frame ingestor; no
/// fan-in between clients (every accepted connection gets its own
/// subscription, spec.md §4.6).
async fn handle_ws<I, M>(mut socket: WebSocket, state: Arc<GatewayState<I, M>>, robot_id: String)
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    let Some(manager) = state.registry.get(&robot_id).await else {
        let frame = ServerFrame::error(format!("Unknown robot: {robot_id}"));
        let _ = socket.send(Message::Text(frame.to_text().into())).await;
        let _ = socket.close().await;
        return;
    };

    debug!(robot = %robot_id, "client fan-out connected");

    let mut events = manager.events();
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let frame = forward_frame(event);
                        if ws_tx.send(Message::Text(frame.to_text().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_frame(&manager, &text).await {
                            if ws_tx.send(Message::Text(reply.to_text().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    debug!(robot = %robot_id, "client fan-out disconnected");
}

/// Convert a Manager event into the downstream wire shape (spec.md §4.6,
/// §6: `{type:"event", channel, data}`).
fn forward_frame(event: ManagerEvent) -> ServerFrame {
    match event {
        ManagerEvent::ChannelData { channel, data } => ServerFrame::Event { channel, data },
        ManagerEvent::Error { message } => ServerFrame::error(message),
    }
}

/// Handle one inbound client frame, returning a reply frame only when one
/// is owed (errors, and the always-rejected reserved asset request;
/// successful commands are fire-and-forget per spec.md §4.6).
async fn handle_client_frame(manager: &RobotManager, text: &str) -> Option<ServerFrame> {
    let frame = match parse_client_frame(text) {
        Ok(frame) => frame,
        Err(message) => return Some(ServerFrame::error(message)),
    };

    match frame {
        ClientFrame::Command { channel, data } => match manager.handle_command(&channel, &data).await {
            Ok(()) => None,
            Err(err) => Some(ServerFrame::channel_error(channel, err.to_string())),
        },
        ClientFrame::Request { channel, request_id, .. } => {
            debug!(%channel, %request_id, "rejecting reserved asset request channel");
            Some(ServerFrame::request_error(request_id, format!("{channel} channel is disabled")))
        }
    }
}
