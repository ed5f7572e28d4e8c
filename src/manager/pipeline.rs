// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure message parsing and transform-selection logic for the Robot Manager
//! subscribe pipeline (spec.md §4.4). Kept free of async/IO so the pose
//! selection, AMCL suppression, and laser projection rules are unit
//! testable in isolation, the way the teacher keeps `upstream/bridge.rs`'s
//! `stamp_request_id`/`strip_request_id` as plain functions beside the
//! stateful connection loop.

use serde::Deserialize;
use serde_json::Value;

use crate::transform::{combine, is_stale, yaw_from_quaternion, Pose2D, Quaternion, StampedPose};

/// Base-link frame names recognized as the robot's body frame (spec.md §4.4
/// TF ingestion).
const BASE_FRAMES: &[&str] = &["base_link", "base_footprint"];
/// Laser frame names recognized as the scanner's frame.
const LASER_FRAMES: &[&str] = &["laser", "base_scan"];

#[derive(Debug, Deserialize, Default)]
struct StampMsg {
    #[serde(default)]
    sec: i64,
    #[serde(default)]
    nanosec: i64,
}

#[derive(Debug, Deserialize, Default)]
struct HeaderMsg {
    #[serde(default)]
    stamp: Option<StampMsg>,
    #[serde(default)]
    frame_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Vector3Msg {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize, Default)]
struct PoseMsg {
    #[serde(default)]
    position: Vector3Msg,
    #[serde(default)]
    orientation: Quaternion,
}

#[derive(Debug, Deserialize, Default)]
struct PoseWithCovarianceMsg {
    #[serde(default)]
    pose: PoseMsg,
}

#[derive(Debug, Deserialize, Default)]
struct OdometryMsg {
    #[serde(default)]
    header: HeaderMsg,
    #[serde(default)]
    pose: PoseWithCovarianceMsg,
}

/// Convert a ROS-style `{sec, nanosec}` header stamp into milliseconds.
/// `None` only when the `stamp` field is absent entirely; a present stamp
/// of `{0, 0}` yields `Some(0)`, which `is_stale` treats as timeless
/// (spec.md I6).
fn stamp_to_ms(header: &HeaderMsg) -> Option<i64> {
    let stamp = header.stamp.as_ref()?;
    Some(stamp.sec * 1000 + stamp.nanosec / 1_000_000)
}

/// Parse an `nav_msgs/msg/Odometry` payload into a stamped map-of(odom)
/// pose (spec.md §4.4 `odom` pipeline).
pub fn parse_odom(msg: &Value) -> Option<StampedPose> {
    let odom: OdometryMsg = serde_json::from_value(msg.clone()).ok()?;
    let position = odom.pose.pose.position;
    let yaw = yaw_from_quaternion(odom.pose.pose.orientation);
    let stamp_ms = stamp_to_ms(&odom.header);
    Some(StampedPose::new(Pose2D::new(position.x, position.y, yaw), stamp_ms))
}

/// Parse a `geometry_msgs/msg/PoseWithCovarianceStamped`-shaped AMCL payload
/// into a plain pose (spec.md §4.4 `amcl` pipeline — only the pose is
/// retained, no staleness tracking applies to the AMCL fallback).
pub fn parse_amcl(msg: &Value) -> Option<Pose2D> {
    let odom: OdometryMsg = serde_json::from_value(msg.clone()).ok()?;
    let position = odom.pose.pose.position;
    let yaw = yaw_from_quaternion(odom.pose.pose.orientation);
    Some(Pose2D::new(position.x, position.y, yaw))
}

/// True iff `next` should be suppressed relative to `prev` because both the
/// position and yaw deltas are below threshold (spec.md §4.4 `amcl`
/// pipeline, P4). A `None` previous pose never suppresses (the first
/// message always updates the cache).
pub fn amcl_suppressed(prev: Option<Pose2D>, next: Pose2D, min_delta_pos: f64, min_delta_yaw: f64) -> bool {
    let Some(prev) = prev else {
        return false;
    };
    let dx = next.x - prev.x;
    let dy = next.y - prev.y;
    let dist = (dx * dx + dy * dy).sqrt();
    let dyaw = (next.yaw - prev.yaw).abs();
    dist < min_delta_pos && dyaw < min_delta_yaw
}

/// One parsed entry from a `tf2_msgs/msg/TFMessage` (`/tf` or `/tf_static`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfEntry {
    pub parent: TfFrame,
    pub stamp_ms: Option<i64>,
    pub pose: Pose2D,
}

/// Which cached transform slot a TF entry belongs to (spec.md §4.4 TF
/// ingestion table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfFrame {
    MapToOdom,
    MapToBase,
    OdomToBase,
    LaserToBase,
}

#[derive(Debug, Deserialize, Default)]
struct TransformMsg {
    #[serde(default)]
    translation: Vector3Msg,
    #[serde(default)]
    rotation: Quaternion,
}

#[derive(Debug, Deserialize, Default)]
struct TransformStampedMsg {
    #[serde(default)]
    header: HeaderMsg,
    #[serde(default)]
    child_frame_id: String,
    #[serde(default)]
    transform: TransformMsg,
}

#[derive(Debug, Deserialize, Default)]
struct TfMessageMsg {
    #[serde(default)]
    transforms: Vec<TransformStampedMsg>,
}

/// Parse a `/tf` or `/tf_static` payload into the subset of entries the
/// Manager cares about (spec.md §4.4 TF ingestion). Entries for
/// unrecognized `(parent, child)` pairs are dropped.
pub fn parse_tf_message(msg: &Value) -> Vec<TfEntry> {
    let Ok(parsed) = serde_json::from_value::<TfMessageMsg>(msg.clone()) else {
        return Vec::new();
    };

    parsed
        .transforms
        .into_iter()
        .filter_map(|t| {
            let parent_name = t.header.frame_id.as_deref().unwrap_or("");
            let child_name = t.child_frame_id.as_str();
            let frame = classify_tf(parent_name, child_name)?;
            let stamp_ms = stamp_to_ms(&t.header);
            let yaw = yaw_from_quaternion(t.transform.rotation);
            let pose =
                Pose2D::new(t.transform.translation.x, t.transform.translation.y, yaw);
            Some(TfEntry { parent: frame, stamp_ms, pose })
        })
        .collect()
}

fn classify_tf(parent: &str, child: &str) -> Option<TfFrame> {
    if parent == "map" && child == "odom" {
        return Some(TfFrame::MapToOdom);
    }
    if parent == "map" && BASE_FRAMES.contains(&child) {
        return Some(TfFrame::MapToBase);
    }
    if parent == "odom" && BASE_FRAMES.contains(&child) {
        return Some(TfFrame::OdomToBase);
    }
    if LASER_FRAMES.contains(&child) && BASE_FRAMES.contains(&parent) {
        return Some(TfFrame::LaserToBase);
    }
    None
}

/// Cached transform snapshot used by pose selection (spec.md §4.4 Pose
/// selection). Threaded through as plain values rather than a shared
/// struct reference so the selection rule stays a pure function.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfCache {
    pub map_to_odom: Option<StampedPose>,
    pub map_to_base: Option<StampedPose>,
    pub odom_to_base: Option<StampedPose>,
}

/// Choose the best available `map -> base` pose, in the priority order
/// spec.md §4.4 "Pose selection (hysteresis)" lays out. `reference_stamp_ms`
/// is the odom timestamp staleness is measured against. Returns `None` if
/// nothing usable is cached yet.
#[allow(clippy::too_many_arguments)]
pub fn select_pose(
    tf: &TfCache,
    odom_pose: Option<StampedPose>,
    amcl_pose: Option<Pose2D>,
    reference_stamp_ms: Option<i64>,
    stale_threshold_ms: i64,
) -> Option<Pose2D> {
    if let Some(map_to_base) = tf.map_to_base {
        if !is_stale(map_to_base.stamp_ms, reference_stamp_ms, stale_threshold_ms) {
            return Some(map_to_base.pose);
        }
    }
    if let (Some(map_to_odom), Some(odom_to_base)) = (tf.map_to_odom, tf.odom_to_base) {
        if !is_stale(map_to_odom.stamp_ms, reference_stamp_ms, stale_threshold_ms)
            && !is_stale(odom_to_base.stamp_ms, reference_stamp_ms, stale_threshold_ms)
        {
            return Some(combine(map_to_odom.pose, odom_to_base.pose));
        }
    }
    if let (Some(map_to_odom), Some(odom_pose)) = (tf.map_to_odom, odom_pose) {
        if !is_stale(map_to_odom.stamp_ms, reference_stamp_ms, stale_threshold_ms)
            && !is_stale(odom_pose.stamp_ms, reference_stamp_ms, stale_threshold_ms)
        {
            return Some(combine(map_to_odom.pose, odom_pose.pose));
        }
    }
    amcl_pose
}

/// True iff `next` differs from `prev` by at least `eps` in position or
/// yaw — the suppression rule for the synthetic `pose` channel (spec.md
/// §4.4, `POSE_EPS`).
pub fn pose_exceeds_epsilon(prev: Option<Pose2D>, next: Pose2D, eps: f64) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    let dx = next.x - prev.x;
    let dy = next.y - prev.y;
    let dist = (dx * dx + dy * dy).sqrt();
    let dyaw = (next.yaw - prev.yaw).abs();
    dist >= eps || dyaw >= eps
}

/// Laser-pose selection (spec.md §4.4 "Laser-pose selection"): uses the
/// scan's own stamp as reference, prefers the fresh `mapToOdom ∘ odomPose`
/// composition, falls back to the last AMCL pose, else `None` (raw
/// passthrough — no map-frame points computed).
pub fn select_laser_pose(
    tf: &TfCache,
    odom_pose: Option<StampedPose>,
    amcl_pose: Option<Pose2D>,
    scan_stamp_ms: Option<i64>,
    stale_threshold_ms: i64,
) -> Option<Pose2D> {
    if let (Some(map_to_odom), Some(odom_pose)) = (tf.map_to_odom, odom_pose) {
        if !is_stale(map_to_odom.stamp_ms, scan_stamp_ms, stale_threshold_ms)
            && !is_stale(odom_pose.stamp_ms, scan_stamp_ms, stale_threshold_ms)
        {
            return Some(combine(map_to_odom.pose, odom_pose.pose));
        }
    }
    amcl_pose
}

#[derive(Debug, Deserialize, Default)]
struct LaserScanMsg {
    #[serde(default)]
    header: HeaderMsg,
    #[serde(default)]
    angle_min: f64,
    #[serde(default)]
    angle_increment: f64,
    #[serde(default)]
    range_min: f64,
    #[serde(default)]
    range_max: f64,
    #[serde(default)]
    ranges: Vec<f64>,
}

/// A parsed laser scan, pre-projection.
#[derive(Debug, Clone)]
pub struct LaserScan {
    pub stamp_ms: Option<i64>,
    pub angle_min: f64,
    pub angle_increment: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub ranges: Vec<f64>,
}

/// Parse a `sensor_msgs/msg/LaserScan` payload.
pub fn parse_laser(msg: &Value) -> Option<LaserScan> {
    let scan: LaserScanMsg = serde_json::from_value(msg.clone()).ok()?;
    Some(LaserScan {
        stamp_ms: stamp_to_ms(&scan.header),
        angle_min: scan.angle_min,
        angle_increment: scan.angle_increment,
        range_min: scan.range_min,
        range_max: scan.range_max,
        ranges: scan.ranges,
    })
}

/// Project a laser scan's valid ranges into map-frame points by composing
/// `pose ∘ laserOffset ∘ (r·cosθ, r·sinθ)` (spec.md §4.4 `laser` pipeline,
/// S3).
pub fn project_laser_points(scan: &LaserScan, pose: Pose2D, laser_offset: Pose2D) -> Vec<(f64, f64)> {
    let map_to_laser = combine(pose, laser_offset);
    scan.ranges
        .iter()
        .enumerate()
        .filter_map(|(i, &r)| {
            if !r.is_finite() || r < scan.range_min || r > scan.range_max {
                return None;
            }
            let theta = scan.angle_min + (i as f64) * scan.angle_increment;
            let point_in_laser = Pose2D::new(r * theta.cos(), r * theta.sin(), 0.0);
            let map_point = combine(map_to_laser, point_in_laser);
            Some((map_point.x, map_point.y))
        })
        .collect()
}

#[derive(Debug, Deserialize, Default)]
struct PoseStampedMsg {
    #[serde(default)]
    pose: PoseMsg,
}

#[derive(Debug, Deserialize, Default)]
struct PathMsg {
    #[serde(default)]
    poses: Vec<PoseStampedMsg>,
}

/// Parse a `nav_msgs/msg/Path` payload into a list of poses, sanitized per
/// spec.md §4.4 ("waypoints ... array of `{pose}` entries").
pub fn parse_waypoints(msg: &Value) -> Vec<Pose2D> {
    let Ok(path) = serde_json::from_value::<PathMsg>(msg.clone()) else {
        return Vec::new();
    };
    path.poses
        .into_iter()
        .map(|p| Pose2D::new(p.pose.position.x, p.pose.position.y, yaw_from_quaternion(p.pose.orientation)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn odom_json(x: f64, y: f64, sec: i64) -> Value {
        serde_json::json!({
            "header": {"stamp": {"sec": sec, "nanosec": 0}},
            "pose": {"pose": {"position": {"x": x, "y": y}, "orientation": {"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}
        })
    }

    #[test]
    fn parses_odom_pose_and_stamp() {
        let stamped = parse_odom(&odom_json(1.0, 2.0, 5)).expect("parses");
        assert_eq!(stamped.pose, Pose2D::new(1.0, 2.0, 0.0));
        assert_eq!(stamped.stamp_ms, Some(5000));
    }

    #[test]
    fn p4_amcl_suppression_holds_until_threshold() {
        let prev = Some(Pose2D::new(0.0, 0.0, 0.0));
        assert!(amcl_suppressed(prev, Pose2D::new(0.01, 0.0, 0.0), 0.05, 0.05));
        assert!(!amcl_suppressed(prev, Pose2D::new(0.05, 0.0, 0.0), 0.05, 0.05));
        assert!(!amcl_suppressed(prev, Pose2D::new(0.0, 0.0, 0.06), 0.05, 0.05));
        assert!(!amcl_suppressed(None, Pose2D::new(0.0, 0.0, 0.0), 0.05, 0.05));
    }

    #[test]
    fn parses_tf_message_classifies_known_frames() {
        let msg = serde_json::json!({
            "transforms": [
                {
                    "header": {"stamp": {"sec": 1, "nanosec": 0}, "frame_id": "map"},
                    "child_frame_id": "odom",
                    "transform": {"translation": {"x": 1.0, "y": 0.0}, "rotation": {"x":0,"y":0,"z":0,"w":1}}
                },
                {
                    "header": {"stamp": {"sec": 0, "nanosec": 0}, "frame_id": "base_link"},
                    "child_frame_id": "laser",
                    "transform": {"translation": {"x": 0.12, "y": 0.0}, "rotation": {"x":0,"y":0,"z":0,"w":1}}
                },
                {
                    "header": {"stamp": {"sec": 1, "nanosec": 0}, "frame_id": "world"},
                    "child_frame_id": "nowhere",
                    "transform": {"translation": {"x": 0.0, "y": 0.0}, "rotation": {"x":0,"y":0,"z":0,"w":1}}
                }
            ]
        });
        let entries = parse_tf_message(&msg);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].parent, TfFrame::MapToOdom);
        assert_eq!(entries[1].parent, TfFrame::LaserToBase);
        assert_eq!(entries[1].stamp_ms, Some(0));
    }

    #[test]
    fn s2_pose_hysteresis_suppresses_tiny_delta() {
        let tf = TfCache {
            map_to_base: Some(StampedPose::new(Pose2D::new(1.0, 1.0, 0.0), Some(1000))),
            ..Default::default()
        };
        let pose = select_pose(&tf, None, None, Some(1000), 1200).expect("selects map_to_base");
        assert_eq!(pose, Pose2D::new(1.0, 1.0, 0.0));
        assert!(!pose_exceeds_epsilon(Some(pose), Pose2D::new(1.0, 1.0, 0.0), 1e-3));
        assert!(pose_exceeds_epsilon(Some(pose), Pose2D::new(1.01, 1.0, 0.0), 1e-3));
    }

    #[test]
    fn select_pose_falls_back_through_priority_chain() {
        let stale_tf = TfCache {
            map_to_base: Some(StampedPose::new(Pose2D::new(9.0, 9.0, 0.0), Some(0))),
            ..Default::default()
        };
        // stamp 0 => never stale, so map_to_base still wins even with a distant reference.
        let pose = select_pose(&stale_tf, None, None, Some(999_999), 1200);
        assert_eq!(pose, Some(Pose2D::new(9.0, 9.0, 0.0)));

        let amcl_only = TfCache::default();
        let pose = select_pose(&amcl_only, None, Some(Pose2D::new(2.0, 2.0, 0.0)), Some(1000), 1200);
        assert_eq!(pose, Some(Pose2D::new(2.0, 2.0, 0.0)));

        let nothing = TfCache::default();
        assert_eq!(select_pose(&nothing, None, None, Some(1000), 1200), None);
    }

    #[test]
    fn s3_laser_projection_matches_scenario() {
        let scan = LaserScan {
            stamp_ms: Some(1000),
            angle_min: 0.0,
            angle_increment: 0.0,
            range_min: 0.0,
            range_max: 10.0,
            ranges: vec![1.0],
        };
        let map_to_base = Pose2D::new(1.0, 0.0, 0.0);
        let laser_offset = Pose2D::new(0.12, 0.0, 0.0);
        let base = Pose2D::new(0.0, 0.0, FRAC_PI_2);
        let pose = combine(base, map_to_base);
        let points = project_laser_points(&scan, pose, laser_offset);
        assert_eq!(points.len(), 1);
        assert!((points[0].0 - 0.0).abs() < 1e-9);
        assert!((points[0].1 - 2.12).abs() < 1e-9);
    }

    #[test]
    fn laser_projection_drops_out_of_range_values() {
        let scan = LaserScan {
            stamp_ms: None,
            angle_min: 0.0,
            angle_increment: 0.1,
            range_min: 0.1,
            range_max: 5.0,
            ranges: vec![0.05, f64::INFINITY, f64::NAN, 2.0, 6.0],
        };
        let points = project_laser_points(&scan, Pose2D::ZERO, Pose2D::ZERO);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn parses_waypoints_into_pose_list() {
        let msg = serde_json::json!({
            "poses": [
                {"pose": {"position": {"x": 1.0, "y": 2.0}, "orientation": {"x":0,"y":0,"z":0,"w":1}}},
                {"pose": {"position": {"x": 3.0, "y": 4.0}, "orientation": {"x":0,"y":0,"z":0,"w":1}}}
            ]
        });
        let poses = parse_waypoints(&msg);
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[1], Pose2D::new(3.0, 4.0, 0.0));
    }
}
