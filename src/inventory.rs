// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot Inventory and Map Store boundaries (spec.md §5, Non-goals): the
//! gateway treats fleet membership and map storage as externally owned.
//! Modeled as traits, grounded on the teacher's `upstream/client.rs`
//! `UpstreamClient` boundary shape — only an in-memory test double ships
//! here; a production deployment supplies its own implementation (e.g.
//! backed by a config service or database) outside this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::transform::Pose2D;
use crate::wire::{ChannelConfig, TeleopLimits};

/// A single fleet entry as reported by the Robot Inventory, in raw form
/// (spec.md §4.5 step 1/2): the Fleet Registry, not the inventory, derives
/// the canonical [`crate::wire::RobotConfig`] from these fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotRecord {
    pub id: String,
    /// Network address of the robot's upstream bridge host. A Manager is
    /// only created for robots with a non-empty address (spec.md I4).
    pub ip_address: String,
    /// Per-robot bridge port override; falls back to the process-wide
    /// `ROS_BRIDGE_PORT` default when absent.
    pub bridge_port: Option<u16>,
    /// Per-robot mapping bridge port override; falls back to the
    /// process-wide `ROS_MAPPING_BRIDGE_PORT` when absent. A mapping
    /// connection is only materialized when one of the two is set.
    pub mapping_bridge_port: Option<u16>,
    /// Raw channel list. `None` (or empty) means the default channel set
    /// applies (spec.md §6).
    pub channels: Option<Vec<ChannelConfig>>,
    pub laser_offset: Option<Pose2D>,
    pub teleop_limits: Option<TeleopLimits>,
}

/// Read-only view onto fleet membership (spec.md §5 Fleet Registry
/// upstream). Implementations may back this with a file, a config
/// service, or a database — this crate only depends on the trait. Not
/// object-safe by design: the Fleet Registry is generic over its
/// inventory rather than boxing it, so no executor-specific future-boxing
/// crate is needed at this boundary.
pub trait RobotInventory: Send + Sync {
    /// The full desired set of robots, keyed by robot id.
    fn list(&self) -> impl Future<Output = anyhow::Result<Vec<RobotRecord>>> + Send;
}

/// Parsed `map_server`-style YAML metadata for an occupancy grid map
/// (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMetadata {
    pub image: String,
    pub resolution: f64,
    pub origin: (f64, f64, f64),
    #[serde(default)]
    pub negate: i32,
    #[serde(default = "default_occupied_thresh")]
    pub occupied_thresh: f64,
    #[serde(default = "default_free_thresh")]
    pub free_thresh: f64,
}

fn default_occupied_thresh() -> f64 {
    0.65
}

fn default_free_thresh() -> f64 {
    0.196
}

/// A fetched occupancy grid map plus its metadata, ready for storage
/// (spec.md §4.7, §6 Map upload contract). `filename` is the Map Store's
/// primary key; `robot_id` is set only for the map that should be linked
/// to the robot (the first map in the response — additional maps are
/// upserted unlinked).
#[derive(Debug, Clone, PartialEq)]
pub struct MapUpload {
    pub name: String,
    pub filename: String,
    pub image: Vec<u8>,
    pub metadata: MapMetadata,
    pub features: serde_json::Value,
    pub robot_id: Option<String>,
}

/// Write-side boundary for fetched maps (spec.md §4.7). The gateway never
/// reads maps back through this trait — it only upserts what it fetches.
pub trait MapStore: Send + Sync {
    fn upsert(&self, upload: MapUpload) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// An in-memory [`RobotInventory`] for tests and local development: a
/// fixed, externally-mutable list of records behind a lock so a test can
/// change fleet membership mid-run and observe the Fleet Registry react.
#[derive(Default)]
pub struct InMemoryInventory {
    records: RwLock<Vec<RobotRecord>>,
}

impl InMemoryInventory {
    pub fn new(records: Vec<RobotRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }

    /// Replace the current record set, simulating an inventory update that
    /// the Fleet Registry will pick up on its next poll.
    pub fn set(&self, records: Vec<RobotRecord>) {
        if let Ok(mut guard) = self.records.write() {
            *guard = records;
        }
    }
}

impl RobotInventory for InMemoryInventory {
    async fn list(&self) -> anyhow::Result<Vec<RobotRecord>> {
        Ok(self.records.read().map(|guard| guard.clone()).unwrap_or_default())
    }
}

/// An in-memory [`MapStore`] for tests: records every upsert keyed by
/// filename (the Map Store's primary key per spec.md §6) so a test can
/// assert on what was fetched.
#[derive(Default)]
pub struct InMemoryMapStore {
    uploads: RwLock<HashMap<String, MapUpload>>,
}

impl InMemoryMapStore {
    pub fn get(&self, filename: &str) -> Option<MapUpload> {
        self.uploads.read().ok().and_then(|guard| guard.get(filename).cloned())
    }

    pub fn len(&self) -> usize {
        self.uploads.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MapStore for InMemoryMapStore {
    async fn upsert(&self, upload: MapUpload) -> anyhow::Result<()> {
        if let Ok(mut guard) = self.uploads.write() {
            guard.insert(upload.filename.clone(), upload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(id: &str, ip: &str) -> RobotRecord {
        RobotRecord {
            id: id.to_owned(),
            ip_address: ip.to_owned(),
            bridge_port: None,
            mapping_bridge_port: None,
            channels: None,
            laser_offset: None,
            teleop_limits: None,
        }
    }

    #[tokio::test]
    async fn in_memory_inventory_round_trips() {
        let inventory = InMemoryInventory::new(vec![sample_record("r1", "10.0.0.1")]);
        let listed = inventory.list().await.unwrap_or_default();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "r1");

        inventory.set(vec![sample_record("r1", "10.0.0.1"), sample_record("r2", "10.0.0.2")]);
        let listed = inventory.list().await.unwrap_or_default();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn in_memory_map_store_tracks_latest_upload() {
        let store = InMemoryMapStore::default();
        store
            .upsert(MapUpload {
                name: "floor1".to_owned(),
                filename: "floor1.pgm".to_owned(),
                image: vec![0, 1, 2],
                metadata: MapMetadata {
                    image: "floor1.pgm".to_owned(),
                    resolution: 0.05,
                    origin: (0.0, 0.0, 0.0),
                    negate: 0,
                    occupied_thresh: 0.65,
                    free_thresh: 0.196,
                },
                features: serde_json::json!({}),
                robot_id: Some("r1".to_owned()),
            })
            .await
            .unwrap_or_default();

        let got = store.get("floor1.pgm");
        assert!(got.is_some());
        assert_eq!(got.map(|m| m.name), Some("floor1".to_owned()));
        assert_eq!(store.len(), 1);
    }
}
