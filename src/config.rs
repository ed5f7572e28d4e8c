// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration for the telemetry gateway process.
#[derive(Debug, Clone, clap::Parser)]
#[command(version, about = "Robot Telemetry Gateway")]
pub struct GatewayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8088, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Default upstream bridge port, used when a robot's inventory record
    /// doesn't specify one.
    #[arg(long, default_value_t = 9090, env = "ROS_BRIDGE_PORT")]
    pub ros_bridge_port: u16,

    /// Mapping bridge port. Presence enables a mapping connection fleet-wide
    /// for every robot that doesn't specify its own.
    #[arg(long, env = "ROS_MAPPING_BRIDGE_PORT")]
    pub ros_mapping_bridge_port: Option<u16>,

    /// How often the Fleet Registry re-fetches the Robot Inventory and
    /// reconciles the managed set, in milliseconds.
    #[arg(long, default_value_t = 5000, env = "GATEWAY_INVENTORY_POLL_MS")]
    pub inventory_poll_ms: u64,

    /// Staleness threshold for cached transforms, in milliseconds.
    #[arg(long, default_value_t = 1200, env = "TF_STALE_MS")]
    pub tf_stale_ms: i64,

    /// Minimum AMCL position delta (meters) that counts as a pose update.
    #[arg(long, default_value_t = 0.05, env = "AMCL_MIN_DELTA_POS")]
    pub amcl_min_delta_pos: f64,

    /// Minimum AMCL yaw delta (radians) that counts as a pose update.
    #[arg(long, default_value_t = 0.05, env = "AMCL_MIN_DELTA_YAW")]
    pub amcl_min_delta_yaw: f64,

    /// Minimum pose delta (position or yaw) required to emit a new `pose` event.
    #[arg(long, default_value_t = 1e-3, env = "POSE_EPS")]
    pub pose_eps: f64,

    /// Maximum linear teleop velocity, m/s.
    #[arg(long, default_value_t = 0.5, env = "TELEOP_MAX_LINEAR")]
    pub teleop_max_linear: f64,

    /// Maximum angular teleop velocity, rad/s.
    #[arg(long, default_value_t = 0.8, env = "TELEOP_MAX_ANGULAR")]
    pub teleop_max_angular: f64,

    /// Teleop idle watchdog, milliseconds.
    #[arg(long, default_value_t = 750, env = "TELEOP_WATCHDOG_MS")]
    pub teleop_watchdog_ms: u64,

    /// Initial bridge reconnect backoff, milliseconds.
    #[arg(long, default_value_t = 1000, env = "RECONNECT_MIN_MS")]
    pub reconnect_min_ms: u64,

    /// Maximum bridge reconnect backoff, milliseconds.
    #[arg(long, default_value_t = 10000, env = "RECONNECT_MAX_MS")]
    pub reconnect_max_ms: u64,

    /// Mapping fetch timeout, milliseconds.
    #[arg(long, default_value_t = 15000, env = "MAPPING_FETCH_TIMEOUT_MS")]
    pub mapping_fetch_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn inventory_poll_interval(&self) -> Duration {
        Duration::from_millis(self.inventory_poll_ms)
    }

    pub fn reconnect_min(&self) -> Duration {
        Duration::from_millis(self.reconnect_min_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn teleop_watchdog(&self) -> Duration {
        Duration::from_millis(self.teleop_watchdog_ms)
    }

    pub fn mapping_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.mapping_fetch_timeout_ms)
    }
}

/// A per-robot view of the tunables a [`crate::manager`] needs, derived once
/// at Manager construction so it doesn't have to hold the whole process
/// config (spec.md §4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunables {
    pub tf_stale_ms: i64,
    pub amcl_min_delta_pos: f64,
    pub amcl_min_delta_yaw: f64,
    pub pose_eps: f64,
    pub teleop_max_linear: f64,
    pub teleop_max_angular: f64,
    pub teleop_watchdog: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
}

impl From<&GatewayConfig> for Tunables {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            tf_stale_ms: config.tf_stale_ms,
            amcl_min_delta_pos: config.amcl_min_delta_pos,
            amcl_min_delta_yaw: config.amcl_min_delta_yaw,
            pose_eps: config.pose_eps,
            teleop_max_linear: config.teleop_max_linear,
            teleop_max_angular: config.teleop_max_angular,
            teleop_watchdog: config.teleop_watchdog(),
            reconnect_min: config.reconnect_min(),
            reconnect_max: config.reconnect_max(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8088,
            ros_bridge_port: 9090,
            ros_mapping_bridge_port: None,
            inventory_poll_ms: 5000,
            tf_stale_ms: 1200,
            amcl_min_delta_pos: 0.05,
            amcl_min_delta_yaw: 0.05,
            pose_eps: 1e-3,
            teleop_max_linear: 0.5,
            teleop_max_angular: 0.8,
            teleop_watchdog_ms: 750,
            reconnect_min_ms: 1000,
            reconnect_max_ms: 10000,
            mapping_fetch_timeout_ms: 15000,
        }
    }
}
