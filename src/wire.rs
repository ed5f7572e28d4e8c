// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream Bridge Protocol wire types (spec.md §6): a rosbridge-style
//! `{"op": ...}` JSON-over-WebSocket pub/sub convention, channel
//! configuration, and legacy msgType alias normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transform::Pose2D;

/// Legacy message-type aliases normalized on ingress and in channel configs
/// (spec.md §6 table).
const MSG_TYPE_ALIASES: &[(&str, &str)] = &[
    ("nav_msgs/Odometry", "nav_msgs/msg/Odometry"),
    ("sensor_msgs/LaserScan", "sensor_msgs/msg/LaserScan"),
    ("nav_msgs/Path", "nav_msgs/msg/Path"),
    ("std_msgs/String", "std_msgs/msg/String"),
    ("geometry_msgs/Twist", "geometry_msgs/msg/Twist"),
];

/// Normalize a possibly-legacy message type string to its canonical form.
pub fn normalize_msg_type(msg_type: &str) -> String {
    for (alias, canonical) in MSG_TYPE_ALIASES {
        if msg_type == *alias {
            return (*canonical).to_owned();
        }
    }
    msg_type.to_owned()
}

/// Direction of a channel relative to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Subscribe,
    Publish,
}

/// One upstream bridge connection's identity and URL (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: String,
    pub url: String,
}

/// A named channel exposed to downstream clients (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub topic: String,
    pub msg_type: String,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl ChannelConfig {
    /// The connection id this channel resolves to, defaulting to `"default"`.
    pub fn connection_id(&self) -> &str {
        self.connection_id.as_deref().unwrap_or("default")
    }
}

/// Teleop safety envelope limits (spec.md §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleopLimits {
    pub max_linear: f64,
    pub max_angular: f64,
    pub watchdog_ms: u64,
}

impl Default for TeleopLimits {
    fn default() -> Self {
        Self { max_linear: 0.5, max_angular: 0.8, watchdog_ms: 750 }
    }
}

/// A single robot's full configuration — a pure value, compared by
/// canonical serialization to decide whether a Manager must restart
/// (spec.md I5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub id: String,
    pub connections: Vec<ConnectionConfig>,
    pub channels: Vec<ChannelConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub laser_offset: Option<Pose2D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teleop_limits: Option<TeleopLimits>,
}

/// Canonical JSON shape used for Registry equality (spec.md §6): connections
/// sorted by id, channels sorted by name, laser offset / teleop limits
/// omitted (they don't participate in the wire-protocol identity — only
/// `bridgeUrl`/connections/channels do, per spec.md §6's definition).
#[derive(Serialize)]
struct CanonicalConfig<'a> {
    #[serde(rename = "bridgeUrl")]
    bridge_url: &'a str,
    connections: Vec<&'a ConnectionConfig>,
    channels: Vec<&'a ChannelConfig>,
}

/// Serialize a `RobotConfig` into its canonical comparison form (spec.md
/// §6, §4.5). Two configs are equal iff their canonical serializations are
/// byte-for-byte equal.
pub fn canonical_serialize(config: &RobotConfig) -> String {
    let mut connections: Vec<&ConnectionConfig> = config.connections.iter().collect();
    connections.sort_by(|a, b| a.id.cmp(&b.id));

    let mut channels: Vec<&ChannelConfig> = config.channels.iter().collect();
    channels.sort_by(|a, b| a.name.cmp(&b.name));

    let bridge_url = connections
        .iter()
        .find(|c| c.id == "default")
        .map(|c| c.url.as_str())
        .unwrap_or("");

    let canonical = CanonicalConfig { bridge_url, connections, channels };
    serde_json::to_string(&canonical).unwrap_or_default()
}

/// Default channel set applied when an inventory entry declares none
/// (spec.md §6).
pub fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            name: "odom".to_owned(),
            topic: "/odom".to_owned(),
            msg_type: "nav_msgs/msg/Odometry".to_owned(),
            direction: Direction::Subscribe,
            rate_limit_hz: Some(2.0),
            connection_id: None,
        },
        ChannelConfig {
            name: "laser".to_owned(),
            topic: "/scan".to_owned(),
            msg_type: "sensor_msgs/msg/LaserScan".to_owned(),
            direction: Direction::Subscribe,
            rate_limit_hz: Some(1.0),
            connection_id: None,
        },
        ChannelConfig {
            name: "waypoints".to_owned(),
            topic: "/plan".to_owned(),
            msg_type: "nav_msgs/msg/Path".to_owned(),
            direction: Direction::Subscribe,
            rate_limit_hz: Some(2.0),
            connection_id: None,
        },
        ChannelConfig {
            name: "teleop".to_owned(),
            topic: "/cmd_vel".to_owned(),
            msg_type: "geometry_msgs/msg/Twist".to_owned(),
            direction: Direction::Publish,
            rate_limit_hz: None,
            connection_id: None,
        },
    ]
}

/// Rate-limit overrides applied after normalization regardless of inventory
/// input (spec.md §6).
pub fn apply_rate_limit_overrides(channels: &mut [ChannelConfig]) {
    for channel in channels.iter_mut() {
        match channel.name.as_str() {
            "odom" => channel.rate_limit_hz = Some(2.0),
            "laser" => channel.rate_limit_hz = Some(1.0),
            _ => {}
        }
    }
}

// -- rosbridge-style wire operations ------------------------------------------

/// An outgoing operation on the Upstream Bridge Protocol wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op")]
pub enum OutgoingOp<'a> {
    #[serde(rename = "subscribe")]
    Subscribe { topic: &'a str, r#type: &'a str },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: &'a str },
    #[serde(rename = "advertise")]
    Advertise {
        topic: &'a str,
        r#type: &'a str,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        latch: bool,
    },
    #[serde(rename = "publish")]
    Publish { topic: &'a str, msg: &'a Value },
}

/// Lightweight view into an incoming bridge message without full
/// deserialization of the payload — mirrors the teacher's
/// `RouteInfo`/`extract_route_info` (`upstream/bridge.rs`), generalized from
/// `{event, request_id}` to rosbridge's `{op, topic, msg}`.
#[derive(Debug, Deserialize, Default)]
pub struct IncomingEnvelope {
    pub op: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub msg: Value,
}

/// Parse an incoming bridge message's routing envelope, ignoring the typed
/// payload. Returns a default (all-`None`) envelope on invalid JSON.
pub fn parse_incoming(json: &str) -> IncomingEnvelope {
    serde_json::from_str(json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(normalize_msg_type("nav_msgs/Odometry"), "nav_msgs/msg/Odometry");
        assert_eq!(normalize_msg_type("sensor_msgs/LaserScan"), "sensor_msgs/msg/LaserScan");
        assert_eq!(normalize_msg_type("geometry_msgs/Twist"), "geometry_msgs/msg/Twist");
    }

    #[test]
    fn passes_through_unknown_type() {
        assert_eq!(normalize_msg_type("nav_msgs/msg/Odometry"), "nav_msgs/msg/Odometry");
        assert_eq!(normalize_msg_type("custom/msg/Thing"), "custom/msg/Thing");
    }

    #[test]
    fn default_channels_match_spec_rates() {
        let channels = default_channels();
        let odom = channels.iter().find(|c| c.name == "odom").unwrap();
        assert_eq!(odom.rate_limit_hz, Some(2.0));
        let laser = channels.iter().find(|c| c.name == "laser").unwrap();
        assert_eq!(laser.rate_limit_hz, Some(1.0));
        let teleop = channels.iter().find(|c| c.name == "teleop").unwrap();
        assert_eq!(teleop.direction, Direction::Publish);
    }

    #[test]
    fn p7_canonical_serialize_is_order_independent() {
        let mut config_a = RobotConfig {
            id: "r1".to_owned(),
            connections: vec![
                ConnectionConfig { id: "mapping".to_owned(), url: "ws://a:2".to_owned() },
                ConnectionConfig { id: "default".to_owned(), url: "ws://a:1".to_owned() },
            ],
            channels: default_channels(),
            laser_offset: None,
            teleop_limits: None,
        };
        let config_b = config_a.clone();
        config_a.connections.reverse();
        config_a.channels.reverse();

        assert_eq!(canonical_serialize(&config_a), canonical_serialize(&config_b));
    }

    #[test]
    fn p8_canonical_serialize_differs_on_url_change() {
        let config_a = RobotConfig {
            id: "r1".to_owned(),
            connections: vec![ConnectionConfig { id: "default".to_owned(), url: "ws://a:1".to_owned() }],
            channels: default_channels(),
            laser_offset: None,
            teleop_limits: None,
        };
        let mut config_b = config_a.clone();
        config_b.connections[0].url = "ws://a:2".to_owned();

        assert_ne!(canonical_serialize(&config_a), canonical_serialize(&config_b));
    }

    #[test]
    fn rate_limit_overrides_always_win() {
        let mut channels = vec![ChannelConfig {
            name: "odom".to_owned(),
            topic: "/odom".to_owned(),
            msg_type: "nav_msgs/msg/Odometry".to_owned(),
            direction: Direction::Subscribe,
            rate_limit_hz: Some(50.0),
            connection_id: None,
        }];
        apply_rate_limit_overrides(&mut channels);
        assert_eq!(channels[0].rate_limit_hz, Some(2.0));
    }

    #[test]
    fn parse_incoming_handles_publish_envelope() {
        let json = r#"{"op":"publish","topic":"/odom","msg":{"pose":{}}}"#;
        let envelope = parse_incoming(json);
        assert_eq!(envelope.op.as_deref(), Some("publish"));
        assert_eq!(envelope.topic.as_deref(), Some("/odom"));
    }

    #[test]
    fn parse_incoming_invalid_json_yields_default() {
        let envelope = parse_incoming("not json");
        assert!(envelope.op.is_none());
    }
}
