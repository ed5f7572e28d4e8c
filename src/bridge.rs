// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream Bridge Connection (spec.md §4.1 / C1): a reconnecting
//! WebSocket client to a single ROS bridge endpoint, replaying active
//! subscriptions/advertisements after every reconnect. Modeled on the
//! teacher's `upstream/bridge.rs::run_loop` reconnect-with-backoff loop,
//! generalized from session-scoped PTY framing to topic pub/sub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::wire::{parse_incoming, OutgoingOp};

/// A message received from the upstream bridge on a subscribed topic.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub topic: String,
    pub msg: Value,
}

/// Connection lifecycle events emitted by a [`WsBridge`] (spec.md §4.1).
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Connected,
    Disconnected,
    Error(String),
}

#[derive(Debug, Clone)]
enum OutboundCommand {
    Subscribe { topic: String, msg_type: String },
    Unsubscribe { topic: String },
    Advertise { topic: String, msg_type: String, latch: bool },
    Publish { topic: String, msg_type: String, msg: Value },
}

/// Handle to a running upstream bridge connection. Cloning is cheap; all
/// clones share the same underlying connection task.
#[derive(Clone)]
pub struct WsBridge {
    outbound_tx: mpsc::UnboundedSender<OutboundCommand>,
    incoming_tx: broadcast::Sender<IncomingMessage>,
    events_tx: broadcast::Sender<BridgeEvent>,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
}

impl WsBridge {
    /// Spawn a bridge connection task for `url`. Reconnects forever with
    /// exponential backoff between `reconnect_min` and `reconnect_max`,
    /// doubling on every failed attempt and resetting to `reconnect_min` on
    /// the first successful connect (spec.md I1/I2), until [`WsBridge::disconnect`]
    /// is called.
    pub fn spawn(url: String, reconnect_min: Duration, reconnect_max: Duration) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (incoming_tx, _) = broadcast::channel(1024);
        let (events_tx, _) = broadcast::channel(64);
        let cancel = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(false));

        let handle = Self {
            outbound_tx,
            incoming_tx: incoming_tx.clone(),
            events_tx: events_tx.clone(),
            cancel: cancel.clone(),
            connected: Arc::clone(&connected),
        };

        tokio::spawn(run_loop(
            url,
            reconnect_min,
            reconnect_max,
            outbound_rx,
            incoming_tx,
            events_tx,
            cancel,
            connected,
        ));

        handle
    }

    /// Terminal: stop reconnecting, close the underlying socket (if any),
    /// and cause future operations to be no-ops (spec.md §4.1). Idempotent.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn subscribe_topic(&self, topic: impl Into<String>, msg_type: impl Into<String>) {
        let _ = self
            .outbound_tx
            .send(OutboundCommand::Subscribe { topic: topic.into(), msg_type: msg_type.into() });
    }

    pub fn unsubscribe_topic(&self, topic: impl Into<String>) {
        let _ = self.outbound_tx.send(OutboundCommand::Unsubscribe { topic: topic.into() });
    }

    pub fn advertise(&self, topic: impl Into<String>, msg_type: impl Into<String>, latch: bool) {
        let _ = self.outbound_tx.send(OutboundCommand::Advertise {
            topic: topic.into(),
            msg_type: msg_type.into(),
            latch,
        });
    }

    /// Publish `msg` on `topic`. Transparently advertises `(topic, msgType)`
    /// on first use for the life of the current session, latching iff
    /// `topic == "/initialpose"` (spec.md §4.1).
    pub fn publish(&self, topic: impl Into<String>, msg_type: impl Into<String>, msg: Value) {
        let _ = self.outbound_tx.send(OutboundCommand::Publish {
            topic: topic.into(),
            msg_type: msg_type.into(),
            msg,
        });
    }

    /// Subscribe to this bridge's incoming message stream. Lagged receivers
    /// silently skip ahead (broadcast semantics) — downstream consumers are
    /// expected to rate-limit independently via [`crate::throttle`].
    pub fn incoming(&self) -> broadcast::Receiver<IncomingMessage> {
        self.incoming_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events_tx.subscribe()
    }
}

async fn run_loop(
    url: String,
    reconnect_min: Duration,
    reconnect_max: Duration,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundCommand>,
    incoming_tx: broadcast::Sender<IncomingMessage>,
    events_tx: broadcast::Sender<BridgeEvent>,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = reconnect_min;
    // Replayed onto every new connection so a reconnect is invisible to
    // downstream subscribers (spec.md I2).
    let mut active_subscriptions: HashMap<String, String> = HashMap::new();
    let mut active_advertisements: HashMap<String, (String, bool)> = HashMap::new();

    loop {
        debug!(%url, "connecting to upstream bridge");
        let connect_result = tokio::select! {
            result = connect_async(&url) => result,
            () = cancel.cancelled() => {
                debug!(%url, "bridge canceled before connect");
                return;
            }
        };

        let (ws_stream, _response) = match connect_result {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%url, error = %err, "upstream bridge connect failed");
                let _ = events_tx.send(BridgeEvent::Error(err.to_string()));
                tokio::select! {
                    () = tokio::time::sleep(backoff) => {}
                    () = cancel.cancelled() => return,
                }
                backoff = next_backoff(backoff, reconnect_max);
                continue;
            }
        };

        info!(%url, "upstream bridge connected");
        connected.store(true, Ordering::Relaxed);
        let _ = events_tx.send(BridgeEvent::Connected);
        backoff = reconnect_min;

        let (mut sink, mut stream) = ws_stream.split();

        for (topic, msg_type) in &active_subscriptions {
            send_op(&mut sink, OutgoingOp::Subscribe { topic, r#type: msg_type }).await;
        }
        for (topic, (msg_type, latch)) in &active_advertisements {
            send_op(&mut sink, OutgoingOp::Advertise { topic, r#type: msg_type, latch: *latch })
                .await;
        }

        let mut disconnected = false;
        while !disconnected {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = sink.close().await;
                    connected.store(false, Ordering::Relaxed);
                    let _ = events_tx.send(BridgeEvent::Disconnected);
                    return;
                }
                cmd = outbound_rx.recv() => {
                    match cmd {
                        Some(OutboundCommand::Subscribe { topic, msg_type }) => {
                            send_op(&mut sink, OutgoingOp::Subscribe { topic: &topic, r#type: &msg_type }).await;
                            active_subscriptions.insert(topic, msg_type);
                        }
                        Some(OutboundCommand::Unsubscribe { topic }) => {
                            send_op(&mut sink, OutgoingOp::Unsubscribe { topic: &topic }).await;
                            active_subscriptions.remove(&topic);
                        }
                        Some(OutboundCommand::Advertise { topic, msg_type, latch }) => {
                            send_op(&mut sink, OutgoingOp::Advertise { topic: &topic, r#type: &msg_type, latch }).await;
                            active_advertisements.insert(topic, (msg_type, latch));
                        }
                        Some(OutboundCommand::Publish { topic, msg_type, msg }) => {
                            if !active_advertisements.contains_key(&topic) {
                                let latch = topic == "/initialpose";
                                send_op(&mut sink, OutgoingOp::Advertise { topic: &topic, r#type: &msg_type, latch })
                                    .await;
                                active_advertisements.insert(topic.clone(), (msg_type, latch));
                            }
                            send_op(&mut sink, OutgoingOp::Publish { topic: &topic, msg: &msg }).await;
                        }
                        None => {
                            // Handle dropped: every WsBridge clone has gone away.
                            let _ = sink.close().await;
                            connected.store(false, Ordering::Relaxed);
                            return;
                        }
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let envelope = parse_incoming(text.as_str());
                            if envelope.op.as_deref() == Some("publish") {
                                if let Some(topic) = envelope.topic {
                                    let _ = incoming_tx.send(IncomingMessage { topic, msg: envelope.msg });
                                }
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            disconnected = true;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(%url, error = %err, "upstream bridge read error");
                            disconnected = true;
                        }
                    }
                }
            }
        }

        warn!(%url, "upstream bridge disconnected, reconnecting");
        connected.store(false, Ordering::Relaxed);
        let _ = events_tx.send(BridgeEvent::Disconnected);
        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            () = cancel.cancelled() => return,
        }
        backoff = next_backoff(backoff, reconnect_max);
    }
}

async fn send_op<S>(sink: &mut S, op: OutgoingOp<'_>)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let Ok(text) = serde_json::to_string(&op) else {
        return;
    };
    let _ = sink.send(WsMessage::Text(text.into())).await;
}

/// Double the backoff, clamped at `max` (spec.md I1).
fn next_backoff(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current.saturating_mul(2), max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_clamps() {
        let min = Duration::from_millis(1000);
        let max = Duration::from_millis(10000);
        let mut backoff = min;
        let expected = [2000, 4000, 8000, 10000, 10000];
        for exp in expected {
            backoff = next_backoff(backoff, max);
            assert_eq!(backoff, Duration::from_millis(exp));
        }
    }

    #[test]
    fn backoff_never_exceeds_max_from_large_start() {
        let backoff = next_backoff(Duration::from_millis(9000), Duration::from_millis(10000));
        assert_eq!(backoff, Duration::from_millis(10000));
    }
}
