// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot Manager (spec.md §4.4 / C4): owns every Bridge Connection for one
//! robot, runs the subscribe pipeline, the transform/pose selection, and the
//! teleop safety envelope, and fans out normalized `channel-data` events.
//! Grounded on the teacher's `upstream/bridge.rs` (bridge ownership,
//! `tokio::select!` event loop) and `state.rs::SessionEntry` (one struct per
//! managed external thing, fields behind locks/atomics).

pub mod pipeline;
pub mod teleop;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeEvent, IncomingMessage, WsBridge};
use crate::config::Tunables;
use crate::error::GatewayError;
use crate::throttle::LatestValueThrottle;
use crate::transform::{Pose2D, StampedPose};
use crate::wire::{ChannelConfig, Direction, RobotConfig};

use pipeline::TfCache;

/// An event emitted by a running Manager, consumed by the client fan-out (C6).
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    ChannelData { channel: String, data: Value },
    Error { message: String },
}

/// Which processing pipeline a channel name dispatches to (spec.md §9: a
/// tagged-variant replaces the source's string branching).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelKind {
    Odom,
    Amcl,
    Laser,
    Waypoints,
    Teleop,
    Passthrough,
}

impl ChannelKind {
    fn classify(name: &str) -> Self {
        match name {
            "odom" => Self::Odom,
            "amcl" => Self::Amcl,
            "laser" => Self::Laser,
            "waypoints" => Self::Waypoints,
            "teleop" => Self::Teleop,
            _ => Self::Passthrough,
        }
    }
}

/// Runtime bookkeeping for one configured channel (spec.md §3 "Manager
/// runtime state").
#[derive(Debug, Clone)]
struct ChannelRuntime {
    config: ChannelConfig,
    error_count: u64,
    last_message_at: Option<std::time::Instant>,
}

/// A snapshot of one channel's runtime state, for fleet status observability
/// (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    pub name: String,
    pub error_count: u64,
    pub last_message_at_ms_ago: Option<u64>,
}

type ChannelThrottle = LatestValueThrottle<Value, Box<dyn Fn(Value) + Send + Sync>>;

/// Mutex-guarded mutable Manager state (spec.md §3, §5: single-owner
/// discipline via a mutex covering the state).
struct ManagerState {
    channels: HashMap<String, ChannelRuntime>,
    map_to_odom: Option<StampedPose>,
    map_to_base: Option<StampedPose>,
    odom_to_base: Option<StampedPose>,
    laser_to_base: Option<StampedPose>,
    odom_pose: Option<StampedPose>,
    amcl_pose: Option<Pose2D>,
    last_published_pose: Option<Pose2D>,
    teleop_watchdog: Option<CancellationToken>,
}

impl ManagerState {
    fn tf_cache(&self) -> TfCache {
        TfCache {
            map_to_odom: self.map_to_odom,
            map_to_base: self.map_to_base,
            odom_to_base: self.odom_to_base,
        }
    }
}

/// Immutable-after-construction Manager internals, shared via `Arc` with
/// every spawned task (watchdogs, subscription handlers).
struct ManagerInner {
    id: String,
    config: RobotConfig,
    tunables: Tunables,
    /// One Bridge Connection per configured connection id.
    connections: HashMap<String, WsBridge>,
    state: Mutex<ManagerState>,
    events_tx: broadcast::Sender<ManagerEvent>,
    tf_subscribed: AtomicBool,
    cancel: CancellationToken,
    throttles: RwLock<HashMap<String, ChannelThrottle>>,
}

/// Handle to a running Robot Manager. Cloning is cheap; clones share the
/// same underlying task set and state.
#[derive(Clone)]
pub struct RobotManager {
    inner: Arc<ManagerInner>,
}

impl RobotManager {
    /// Build a Manager from a canonical [`RobotConfig`] and start it
    /// (spec.md §4.4 "Initialization" + "Start"). Construction errors for
    /// individual channels (unresolvable `connectionId`) are emitted on the
    /// `error` event stream; the offending channel is skipped, others
    /// continue (spec.md §7).
    pub fn start(config: RobotConfig, tunables: Tunables) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let cancel = CancellationToken::new();

        let mut connections = HashMap::new();
        for conn in &config.connections {
            connections
                .entry(conn.id.clone())
                .or_insert_with(|| WsBridge::spawn(conn.url.clone(), tunables.reconnect_min, tunables.reconnect_max));
        }
        if connections.is_empty() {
            warn!(robot = %config.id, "robot config has no connections");
        }

        let mut channels = HashMap::new();
        let mut construction_errors = Vec::new();
        for channel in &config.channels {
            if !connections.contains_key(channel.connection_id()) {
                construction_errors.push(GatewayError::resource(format!(
                    "channel {} references unknown connection {}",
                    channel.name,
                    channel.connection_id()
                )));
                continue;
            }
            channels.insert(
                channel.name.clone(),
                ChannelRuntime { config: channel.clone(), error_count: 0, last_message_at: None },
            );
        }

        let state = Mutex::new(ManagerState {
            channels,
            map_to_odom: None,
            map_to_base: None,
            odom_to_base: None,
            laser_to_base: None,
            odom_pose: None,
            amcl_pose: None,
            last_published_pose: None,
            teleop_watchdog: None,
        });

        let inner = Arc::new(ManagerInner {
            id: config.id.clone(),
            config,
            tunables,
            connections,
            state,
            events_tx,
            tf_subscribed: AtomicBool::new(false),
            cancel,
            throttles: RwLock::new(HashMap::new()),
        });

        for err in construction_errors {
            let _ = inner.events_tx.send(ManagerEvent::Error { message: err.to_string() });
        }

        let manager = Self { inner };
        manager.spawn_connection_watchers();
        info!(robot = %manager.inner.id, "robot manager started");
        manager
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &RobotConfig {
        &self.inner.config
    }

    pub fn events(&self) -> broadcast::Receiver<ManagerEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Snapshot of per-channel runtime status (SPEC_FULL.md §3 fleet status).
    pub async fn channel_status(&self) -> Vec<ChannelStatus> {
        let state = self.inner.state.lock().await;
        state
            .channels
            .values()
            .map(|c| ChannelStatus {
                name: c.config.name.clone(),
                error_count: c.error_count,
                last_message_at_ms_ago: c
                    .last_message_at
                    .map(|t| t.elapsed().as_millis().min(u64::MAX as u128) as u64),
            })
            .collect()
    }

    /// True iff `self` and `other` share the same underlying Manager
    /// instance (for asserting Registry identity-preservation, spec.md P7).
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.inner.connections.get(connection_id).map(WsBridge::is_connected).unwrap_or(false)
    }

    /// For every Bridge Connection, spawn a task reacting to its
    /// `connected` event: subscribe to `/tf`/`/tf_static` once on `default`
    /// (spec.md §4.4 "Start"), then subscribe every channel mapped to this
    /// connection.
    fn spawn_connection_watchers(&self) {
        for (connection_id, bridge) in &self.inner.connections {
            let inner = Arc::clone(&self.inner);
            let connection_id = connection_id.clone();
            let bridge = bridge.clone();
            let mut events = bridge.events();
            let cancel = self.inner.cancel.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        event = events.recv() => {
                            match event {
                                Ok(BridgeEvent::Connected) => {
                                    on_connected(&inner, &connection_id, &bridge).await;
                                }
                                Ok(BridgeEvent::Error(message)) => {
                                    let _ = inner.events_tx.send(ManagerEvent::Error { message });
                                }
                                Ok(BridgeEvent::Disconnected) => {}
                                Err(broadcast::error::RecvError::Closed) => return,
                                Err(broadcast::error::RecvError::Lagged(_)) => {}
                            }
                        }
                    }
                }
            });
        }
    }

    /// Process a client command (spec.md §4.4 "Teleop publish pipeline" /
    /// generic `handleCommand`).
    pub async fn handle_command(&self, channel_name: &str, payload: &Value) -> Result<(), GatewayError> {
        let Some(channel) = self.inner.config.channels.iter().find(|c| c.name == channel_name) else {
            return Err(GatewayError::validation(format!("unknown channel: {channel_name}")));
        };
        if channel.direction != Direction::Publish {
            return Err(GatewayError::validation(format!("channel is not publishable: {channel_name}")));
        }
        let Some(bridge) = self.inner.connections.get(channel.connection_id()) else {
            return Err(GatewayError::resource(format!("no connection for channel: {channel_name}")));
        };

        if ChannelKind::classify(channel_name) == ChannelKind::Teleop {
            let (max_linear, max_angular) = match self.inner.config.teleop_limits {
                Some(limits) => (limits.max_linear, limits.max_angular),
                None => (self.inner.tunables.teleop_max_linear, self.inner.tunables.teleop_max_angular),
            };
            let twist = teleop::parse_and_clamp(payload, max_linear, max_angular)
                .map_err(GatewayError::validation)?;
            bridge.publish(channel.topic.clone(), channel.msg_type.clone(), twist.to_wire());
            self.arm_teleop_watchdog(channel.clone(), bridge.clone()).await;
            return Ok(());
        }

        bridge.publish(channel.topic.clone(), channel.msg_type.clone(), payload.clone());
        Ok(())
    }

    /// Arm (or re-arm) the idle watchdog for the teleop channel (spec.md I2,
    /// P6): cancels any previously armed timer, then races a fresh one
    /// against the Manager's own cancellation.
    async fn arm_teleop_watchdog(&self, channel: ChannelConfig, bridge: WsBridge) {
        let watchdog_ms = match self.inner.config.teleop_limits {
            Some(limits) => Duration::from_millis(limits.watchdog_ms),
            None => self.inner.tunables.teleop_watchdog,
        };
        let child = self.inner.cancel.child_token();

        {
            let mut state = self.inner.state.lock().await;
            if let Some(previous) = state.teleop_watchdog.replace(child.clone()) {
                previous.cancel();
            }
        }

        tokio::spawn(async move {
            tokio::select! {
                () = child.cancelled() => {}
                () = tokio::time::sleep(watchdog_ms) => {
                    debug!(channel = %channel.name, "teleop watchdog expired, publishing zero twist");
                    bridge.publish(channel.topic.clone(), channel.msg_type.clone(), teleop::Twist::ZERO.to_wire());
                }
            }
        });
    }

    /// Stop this Manager (spec.md §4.4 "Stop"): emit a zero twist on the
    /// teleop channel if present, cancel every watchdog (via the shared
    /// cancellation token), unsubscribe everything, and disconnect every
    /// Bridge Connection.
    pub async fn stop(&self) {
        info!(robot = %self.inner.id, "robot manager stopping");

        if let Some(channel) = self.inner.config.channels.iter().find(|c| c.name == "teleop") {
            if let Some(bridge) = self.inner.connections.get(channel.connection_id()) {
                bridge.publish(channel.topic.clone(), channel.msg_type.clone(), teleop::Twist::ZERO.to_wire());
            }
        }

        self.inner.cancel.cancel();

        {
            let state = self.inner.state.lock().await;
            for channel in state.channels.values() {
                if channel.config.direction == Direction::Subscribe {
                    if let Some(bridge) = self.inner.connections.get(channel.config.connection_id()) {
                        bridge.unsubscribe_topic(channel.config.topic.clone());
                    }
                }
            }
        }

        for bridge in self.inner.connections.values() {
            bridge.disconnect();
        }
    }
}

/// Reacts to a Bridge Connection's `connected` event: one-shot TF
/// subscription on `default`, plus every subscribe channel mapped to this
/// connection (spec.md §4.4 "Start").
async fn on_connected(inner: &Arc<ManagerInner>, connection_id: &str, bridge: &WsBridge) {
    info!(robot = %inner.id, connection = %connection_id, "bridge connected");

    if connection_id == "default" && !inner.tf_subscribed.swap(true, Ordering::SeqCst) {
        bridge.subscribe_topic("/tf", "tf2_msgs/msg/TFMessage");
        bridge.subscribe_topic("/tf_static", "tf2_msgs/msg/TFMessage");
        spawn_tf_handler(Arc::clone(inner), bridge.clone());
    }

    let channels: Vec<ChannelConfig> = {
        let state = inner.state.lock().await;
        state
            .channels
            .values()
            .map(|c| c.config.clone())
            .filter(|c| c.direction == Direction::Subscribe && c.connection_id() == connection_id)
            .collect()
    };

    for channel in channels {
        bridge.subscribe_topic(channel.topic.clone(), channel.msg_type.clone());
        spawn_channel_handler(Arc::clone(inner), bridge.clone(), channel);
    }
}

/// Subscribe a throttled handler for one channel's incoming messages,
/// filtered to its topic (spec.md §4.4 "for every subscribe channel ...
/// installs an upstream subscription whose handler feeds a per-channel
/// Latest-Value Throttle").
fn spawn_channel_handler(inner: Arc<ManagerInner>, bridge: WsBridge, channel: ChannelConfig) {
    let mut incoming = bridge.incoming();
    let cancel = inner.cancel.clone();

    tokio::spawn(async move {
        let throttle = channel_throttle(&inner, &channel).await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                msg = incoming.recv() => {
                    match msg {
                        Ok(IncomingMessage { topic, msg }) if topic == channel.topic => {
                            mark_channel_message(&inner, &channel.name).await;
                            throttle.push(msg).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Closed) => return,
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                    }
                }
            }
        }
    });
}

/// Build (or fetch the cached) Latest-Value Throttle for a channel: the
/// emitter runs the full processing pipeline and publishes `channel-data`.
async fn channel_throttle(inner: &Arc<ManagerInner>, channel: &ChannelConfig) -> ChannelThrottle {
    if let Some(throttle) = inner.throttles.read().await.get(&channel.name) {
        return throttle.clone();
    }

    let mut guard = inner.throttles.write().await;
    if let Some(throttle) = guard.get(&channel.name) {
        return throttle.clone();
    }

    let weak = Arc::downgrade(inner);
    let channel_name = channel.name.clone();
    let kind = ChannelKind::classify(&channel.name);
    let emit: Box<dyn Fn(Value) + Send + Sync> = Box::new(move |value: Value| {
        let Some(inner) = weak.upgrade() else { return };
        let channel_name = channel_name.clone();
        tokio::spawn(async move {
            process_and_emit(&inner, kind, &channel_name, value).await;
        });
    });

    let throttle = LatestValueThrottle::new(channel.rate_limit_hz, emit);
    guard.insert(channel.name.clone(), throttle.clone());
    throttle
}

async fn mark_channel_message(inner: &Arc<ManagerInner>, channel_name: &str) {
    let mut state = inner.state.lock().await;
    if let Some(runtime) = state.channels.get_mut(channel_name) {
        runtime.last_message_at = Some(std::time::Instant::now());
    }
}

/// Run the subscribe pipeline for one channel's value and emit the
/// sanitized result (spec.md §4.4 "Subscribe pipeline per channel" and
/// "Sanitization").
async fn process_and_emit(inner: &Arc<ManagerInner>, kind: ChannelKind, channel_name: &str, value: Value) {
    match kind {
        ChannelKind::Odom => {
            let Some(stamped) = pipeline::parse_odom(&value) else {
                record_error(inner, channel_name, "unparseable odom payload").await;
                return;
            };
            let mut state = inner.state.lock().await;
            state.odom_pose = Some(stamped);
            emit_sanitized_pose(inner, channel_name, stamped.pose);
            try_publish_pose(inner, &mut state).await;
        }
        ChannelKind::Amcl => {
            let Some(pose) = pipeline::parse_amcl(&value) else {
                record_error(inner, channel_name, "unparseable amcl payload").await;
                return;
            };
            let mut state = inner.state.lock().await;
            let suppressed = pipeline::amcl_suppressed(
                state.amcl_pose,
                pose,
                inner.tunables.amcl_min_delta_pos,
                inner.tunables.amcl_min_delta_yaw,
            );
            if !suppressed {
                state.amcl_pose = Some(pose);
                emit_sanitized_pose(inner, channel_name, pose);
            }
        }
        ChannelKind::Laser => {
            let Some(scan) = pipeline::parse_laser(&value) else {
                record_error(inner, channel_name, "unparseable laser payload").await;
                return;
            };
            if scan.stamp_ms.is_none() {
                let _ = inner
                    .events_tx
                    .send(ManagerEvent::ChannelData { channel: channel_name.to_owned(), data: value });
                return;
            }

            let state = inner.state.lock().await;
            let pose = pipeline::select_laser_pose(
                &state.tf_cache(),
                state.odom_pose,
                state.amcl_pose,
                scan.stamp_ms,
                inner.tunables.tf_stale_ms,
            );
            let laser_offset = state
                .laser_to_base
                .map(|t| t.pose)
                .unwrap_or_else(|| inner.config.laser_offset.unwrap_or(DEFAULT_LASER_OFFSET));
            drop(state);

            let data = match pose {
                Some(pose) => {
                    let points = pipeline::project_laser_points(&scan, pose, laser_offset);
                    serde_json::json!({
                        "frame": "map",
                        "angleMin": scan.angle_min,
                        "angleIncrement": scan.angle_increment,
                        "rangeMin": scan.range_min,
                        "rangeMax": scan.range_max,
                        "ranges": scan.ranges,
                        "points": points,
                    })
                }
                None => value,
            };
            let _ = inner.events_tx.send(ManagerEvent::ChannelData { channel: channel_name.to_owned(), data });
        }
        ChannelKind::Waypoints => {
            let poses = pipeline::parse_waypoints(&value);
            let data = serde_json::json!({
                "poses": poses.into_iter().map(|p| serde_json::json!({"pose": p})).collect::<Vec<_>>(),
            });
            let _ = inner.events_tx.send(ManagerEvent::ChannelData { channel: channel_name.to_owned(), data });
        }
        ChannelKind::Teleop | ChannelKind::Passthrough => {
            let _ = inner.events_tx.send(ManagerEvent::ChannelData { channel: channel_name.to_owned(), data: value });
        }
    }
}

/// Default static `laser -> base` offset when no dynamic TF has been
/// learned yet (spec.md §4.4 "laser" pipeline).
const DEFAULT_LASER_OFFSET: Pose2D = Pose2D { x: 0.12, y: 0.0, yaw: 0.0 };

fn emit_sanitized_pose(inner: &Arc<ManagerInner>, channel_name: &str, pose: Pose2D) {
    let _ = inner.events_tx.send(ManagerEvent::ChannelData {
        channel: channel_name.to_owned(),
        data: serde_json::json!({"pose": pose}),
    });
}

async fn record_error(inner: &Arc<ManagerInner>, channel_name: &str, message: &str) {
    let mut state = inner.state.lock().await;
    if let Some(runtime) = state.channels.get_mut(channel_name) {
        runtime.error_count += 1;
    }
    let _ = inner
        .events_tx
        .send(ManagerEvent::Error { message: format!("{channel_name}: {message}") });
}

/// Attempt to publish a synthetic `pose` event (spec.md §4.4 "Pose
/// selection (hysteresis)"). Suppressed if the delta from the last
/// published pose is below `POSE_EPS`.
async fn try_publish_pose(inner: &Arc<ManagerInner>, state: &mut ManagerState) {
    let reference_stamp_ms = state.odom_pose.and_then(|p| p.stamp_ms);
    let Some(pose) = pipeline::select_pose(
        &state.tf_cache(),
        state.odom_pose,
        state.amcl_pose,
        reference_stamp_ms,
        inner.tunables.tf_stale_ms,
    ) else {
        return;
    };

    if !pipeline::pose_exceeds_epsilon(state.last_published_pose, pose, inner.tunables.pose_eps) {
        return;
    }
    state.last_published_pose = Some(pose);
    let _ = inner
        .events_tx
        .send(ManagerEvent::ChannelData { channel: "pose".to_owned(), data: serde_json::json!({"pose": pose}) });
}

/// Subscribe a handler for `/tf` and `/tf_static` on the `default`
/// connection, updating the cached transforms (spec.md §4.4 "TF
/// ingestion"). TF updates are applied in arrival order regardless of
/// relative stamp (spec.md §5 "Ordering guarantees").
fn spawn_tf_handler(inner: Arc<ManagerInner>, bridge: WsBridge) {
    let mut incoming = bridge.incoming();
    let cancel = inner.cancel.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                msg = incoming.recv() => {
                    match msg {
                        Ok(IncomingMessage { topic, msg }) if topic == "/tf" || topic == "/tf_static" => {
                            let entries = pipeline::parse_tf_message(&msg);
                            if entries.is_empty() {
                                continue;
                            }
                            let mut state = inner.state.lock().await;
                            for entry in entries {
                                let stamped = StampedPose::new(entry.pose, entry.stamp_ms);
                                match entry.parent {
                                    pipeline::TfFrame::MapToOdom => state.map_to_odom = Some(stamped),
                                    pipeline::TfFrame::MapToBase => state.map_to_base = Some(stamped),
                                    pipeline::TfFrame::OdomToBase => state.odom_to_base = Some(stamped),
                                    pipeline::TfFrame::LaserToBase => state.laser_to_base = Some(stamped),
                                }
                            }
                            try_publish_pose(&inner, &mut state).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Closed) => return,
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{default_channels, ConnectionConfig};

    fn tunables() -> Tunables {
        Tunables {
            tf_stale_ms: 1200,
            amcl_min_delta_pos: 0.05,
            amcl_min_delta_yaw: 0.05,
            pose_eps: 1e-3,
            teleop_max_linear: 0.5,
            teleop_max_angular: 0.8,
            teleop_watchdog: Duration::from_millis(60),
            reconnect_min: Duration::from_millis(1000),
            reconnect_max: Duration::from_millis(10000),
        }
    }

    fn config(id: &str, url: &str) -> RobotConfig {
        RobotConfig {
            id: id.to_owned(),
            connections: vec![ConnectionConfig { id: "default".to_owned(), url: url.to_owned() }],
            channels: default_channels(),
            laser_offset: None,
            teleop_limits: None,
        }
    }

    #[tokio::test]
    async fn construction_reports_error_for_unresolvable_connection_id() {
        let mut cfg = config("r1", "ws://127.0.0.1:1/does-not-matter");
        cfg.channels.push(ChannelConfig {
            name: "odd".to_owned(),
            topic: "/odd".to_owned(),
            msg_type: "std_msgs/msg/String".to_owned(),
            direction: Direction::Subscribe,
            rate_limit_hz: None,
            connection_id: Some("missing".to_owned()),
        });

        let manager = RobotManager::start(cfg, tunables());
        let mut events = manager.events();
        let event = tokio::time::timeout(Duration::from_millis(200), events.recv())
            .await
            .expect("event arrives")
            .expect("channel open");
        match event {
            ManagerEvent::Error { message } => assert!(message.contains("missing")),
            other => panic!("expected construction error, got {other:?}"),
        }
        manager.stop().await;
    }

    #[tokio::test]
    async fn rejects_unknown_channel_command() {
        let manager = RobotManager::start(config("r1", "ws://127.0.0.1:1"), tunables());
        let result = manager.handle_command("nonexistent", &serde_json::json!({})).await;
        assert!(result.is_err());
        manager.stop().await;
    }

    #[tokio::test]
    async fn rejects_publish_on_subscribe_channel() {
        let manager = RobotManager::start(config("r1", "ws://127.0.0.1:1"), tunables());
        let result = manager.handle_command("odom", &serde_json::json!({})).await;
        assert!(result.is_err());
        manager.stop().await;
    }
}
