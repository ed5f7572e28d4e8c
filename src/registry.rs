// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet Registry (spec.md §4.5 / C5): reconciles the set of Robot Managers
//! with the current Robot Inventory. Grounded on the teacher's
//! `transport/http.rs` session map (keyed-by-id, stale-entry eviction) and
//! `upstream/health.rs::spawn_health_checker`'s snapshot-then-act shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Tunables;
use crate::inventory::{MapStore, RobotInventory, RobotRecord};
use crate::manager::RobotManager;
use crate::mapping;
use crate::wire::{
    apply_rate_limit_overrides, canonical_serialize, default_channels, normalize_msg_type,
    ChannelConfig, ConnectionConfig, RobotConfig,
};

/// Keeps `robotId -> RobotManager` aligned with the Robot Inventory (spec.md
/// I4, I5). Safe to read concurrently with reconciliation (spec.md §5
/// "Shared resources").
pub struct FleetRegistry<I, M> {
    inventory: I,
    map_store: Arc<M>,
    tunables: Tunables,
    /// `ROS_BRIDGE_PORT` fallback for records without a `bridge_port`.
    default_bridge_port: u16,
    /// `ROS_MAPPING_BRIDGE_PORT` fallback, enabling a mapping connection
    /// fleet-wide (SPEC_FULL.md §2.1).
    default_mapping_port: Option<u16>,
    mapping_fetch_timeout: Duration,
    managers: RwLock<HashMap<String, (RobotManager, String)>>,
}

impl<I, M> FleetRegistry<I, M>
where
    I: RobotInventory,
    M: MapStore + 'static,
{
    pub fn new(
        inventory: I,
        map_store: Arc<M>,
        tunables: Tunables,
        default_bridge_port: u16,
        default_mapping_port: Option<u16>,
        mapping_fetch_timeout: Duration,
    ) -> Self {
        Self {
            inventory,
            map_store,
            tunables,
            default_bridge_port,
            default_mapping_port,
            mapping_fetch_timeout,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// The current managed set, for the client fan-out (C6) and fleet
    /// status observability.
    pub async fn get(&self, robot_id: &str) -> Option<RobotManager> {
        self.managers.read().await.get(robot_id).map(|(m, _)| m.clone())
    }

    pub async fn list(&self) -> Vec<RobotManager> {
        self.managers.read().await.values().map(|(m, _)| m.clone()).collect()
    }

    /// Reconcile the managed set against the Robot Inventory (spec.md §4.5
    /// steps 1-4). Idempotent (P7): calling this twice with an unchanged
    /// inventory leaves every Manager instance identity unchanged.
    pub async fn reload(&self) -> anyhow::Result<()> {
        let mut records = self.inventory.list().await?;
        apply_process_wide_mapping_port(&mut records, self.default_mapping_port);

        let mut desired: HashMap<String, (RobotConfig, String, RobotRecord)> = HashMap::new();
        for record in records {
            if record.ip_address.trim().is_empty() {
                continue;
            }
            let config = build_robot_config(&record, self.default_bridge_port);
            let canonical = canonical_serialize(&config);
            desired.insert(record.id.clone(), (config, canonical, record));
        }

        let mut managers = self.managers.write().await;

        // Stop and remove managers no longer desired.
        let to_remove: Vec<String> =
            managers.keys().filter(|id| !desired.contains_key(id.as_str())).cloned().collect();
        for id in to_remove {
            if let Some((manager, _)) = managers.remove(&id) {
                info!(robot = %id, "fleet registry removing robot");
                manager.stop().await;
            }
        }

        // Start new managers, restart ones whose canonical config changed.
        for (id, (config, canonical, record)) in desired {
            match managers.get(&id) {
                Some((_, existing_canonical)) if existing_canonical == &canonical => {
                    debug!(robot = %id, "fleet registry: config unchanged");
                }
                Some((old_manager, _)) => {
                    info!(robot = %id, "fleet registry restarting robot: config changed");
                    old_manager.stop().await;
                    let manager = RobotManager::start(config, self.tunables);
                    managers.insert(id, (manager, canonical));
                    self.spawn_mapping_fetch(&record);
                }
                None => {
                    info!(robot = %id, "fleet registry starting robot");
                    let manager = RobotManager::start(config, self.tunables);
                    managers.insert(id, (manager, canonical));
                    self.spawn_mapping_fetch(&record);
                }
            }
        }

        Ok(())
    }

    /// Kick off a one-shot Mapping Fetcher (spec.md §4.7 / C7) for a robot
    /// whose record carries a mapping bridge port, whenever its Manager is
    /// (re)started. Best-effort and fire-and-forget: failures are logged
    /// and swallowed inside `mapping::fetch_and_store` itself.
    fn spawn_mapping_fetch(&self, record: &RobotRecord) {
        let Some(mapping_port) = record.mapping_bridge_port else { return };
        let robot_id = record.id.clone();
        let ip_address = record.ip_address.clone();
        let timeout = self.mapping_fetch_timeout;
        let store = Arc::clone(&self.map_store);
        tokio::spawn(async move {
            mapping::fetch_and_store(&robot_id, &ip_address, mapping_port, timeout, store.as_ref()).await;
        });
    }

    /// Stop every managed robot (used on graceful process shutdown,
    /// SPEC_FULL.md §3).
    pub async fn stop_all(&self) {
        let mut managers = self.managers.write().await;
        for (id, (manager, _)) in managers.drain() {
            info!(robot = %id, "fleet registry stopping robot on shutdown");
            manager.stop().await;
        }
    }
}

/// Derive a robot's canonical [`RobotConfig`] from its raw inventory record
/// (spec.md §4.5 step 2, §6): `bridgeUrl = ws://ip:bridgePort`, an optional
/// `mapping` connection, channels normalized through msgType aliasing and
/// rate-limit overrides.
fn build_robot_config(record: &RobotRecord, default_bridge_port: u16) -> RobotConfig {
    let bridge_port = record.bridge_port.unwrap_or(default_bridge_port);
    let mut connections =
        vec![ConnectionConfig { id: "default".to_owned(), url: format!("ws://{}:{}", record.ip_address, bridge_port) }];

    if let Some(mapping_port) = record.mapping_bridge_port {
        connections.push(ConnectionConfig {
            id: "mapping".to_owned(),
            url: format!("ws://{}:{}", record.ip_address, mapping_port),
        });
    }

    let mut channels: Vec<ChannelConfig> = match &record.channels {
        Some(channels) if !channels.is_empty() => channels
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.msg_type = normalize_msg_type(&c.msg_type);
                c
            })
            .collect(),
        _ => default_channels(),
    };
    apply_rate_limit_overrides(&mut channels);

    RobotConfig {
        id: record.id.clone(),
        connections,
        channels,
        laser_offset: record.laser_offset,
        teleop_limits: record.teleop_limits,
    }
}

/// The mapping-port the Fleet Registry should use fleet-wide when a record
/// doesn't specify its own (SPEC_FULL.md §2.1 `ROS_MAPPING_BRIDGE_PORT`).
/// Applied by [`apply_process_wide_mapping_port`] before reconciliation so
/// [`build_robot_config`] stays a pure function of the record alone.
pub fn apply_process_wide_mapping_port(records: &mut [RobotRecord], process_wide_port: Option<u16>) {
    let Some(port) = process_wide_port else { return };
    for record in records.iter_mut() {
        if record.mapping_bridge_port.is_none() {
            record.mapping_bridge_port = Some(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{InMemoryInventory, InMemoryMapStore};
    use std::time::Duration;

    fn tunables() -> Tunables {
        Tunables {
            tf_stale_ms: 1200,
            amcl_min_delta_pos: 0.05,
            amcl_min_delta_yaw: 0.05,
            pose_eps: 1e-3,
            teleop_max_linear: 0.5,
            teleop_max_angular: 0.8,
            teleop_watchdog: Duration::from_millis(750),
            reconnect_min: Duration::from_millis(1000),
            reconnect_max: Duration::from_millis(10000),
        }
    }

    fn record(id: &str, ip: &str, bridge_port: Option<u16>) -> RobotRecord {
        RobotRecord {
            id: id.to_owned(),
            ip_address: ip.to_owned(),
            bridge_port,
            mapping_bridge_port: None,
            channels: None,
            laser_offset: None,
            teleop_limits: None,
        }
    }

    #[tokio::test]
    async fn i4_skips_robots_without_an_address() {
        let inventory = InMemoryInventory::new(vec![record("r1", "", None)]);
        let registry = FleetRegistry::new(inventory, Arc::new(InMemoryMapStore::default()), tunables(), 9090, None, Duration::from_secs(15));
        registry.reload().await.expect("reload succeeds");
        assert!(registry.get("r1").await.is_none());
    }

    #[tokio::test]
    async fn p7_reload_is_idempotent_for_unchanged_inventory() {
        let inventory = InMemoryInventory::new(vec![record("r1", "10.0.0.1", None), record("r2", "10.0.0.2", None)]);
        let registry = FleetRegistry::new(inventory, Arc::new(InMemoryMapStore::default()), tunables(), 9090, None, Duration::from_secs(15));
        registry.reload().await.expect("reload succeeds");

        let before_a = registry.get("r1").await.expect("r1 managed");
        registry.reload().await.expect("second reload succeeds");
        let after_a = registry.get("r1").await.expect("r1 still managed");

        assert!(before_a.same_instance(&after_a));
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn s4_restart_on_config_change_and_drop_on_removal() {
        let inventory = InMemoryInventory::new(vec![record("a", "10.0.0.1", None), record("b", "10.0.0.2", None)]);
        let registry = FleetRegistry::new(inventory, Arc::new(InMemoryMapStore::default()), tunables(), 9090, None, Duration::from_secs(15));
        registry.reload().await.expect("reload succeeds");

        let a_before = registry.get("a").await.expect("a managed");

        // B's bridge port changes: its manager must be replaced; A untouched.
        registry.inventory.set(vec![record("a", "10.0.0.1", None), record("b", "10.0.0.2", Some(9999))]);
        registry.reload().await.expect("reload succeeds");

        let a_after = registry.get("a").await.expect("a still managed");
        assert!(a_before.same_instance(&a_after));

        // A is dropped entirely.
        registry.inventory.set(vec![record("b", "10.0.0.2", Some(9999))]);
        registry.reload().await.expect("reload succeeds");
        assert!(registry.get("a").await.is_none());
        assert!(registry.get("b").await.is_some());
    }
}
