// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! 2-D rigid-body transform algebra: composition, inversion, quaternion to
//! yaw, and staleness checking (spec.md §4.3).

use serde::{Deserialize, Serialize};

/// A planar pose / rigid-body transform: translation plus heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub const ZERO: Pose2D = Pose2D { x: 0.0, y: 0.0, yaw: 0.0 };

    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

/// A `Pose2D` with an optional wall-clock stamp, in milliseconds.
///
/// A stamp of `0` (or absent) is treated as static/timeless — never stale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    pub pose: Pose2D,
    pub stamp_ms: Option<i64>,
}

impl StampedPose {
    pub fn new(pose: Pose2D, stamp_ms: Option<i64>) -> Self {
        Self { pose, stamp_ms }
    }

    pub fn static_pose(pose: Pose2D) -> Self {
        Self { pose, stamp_ms: None }
    }
}

/// Rotate-then-translate composition of two planar rigid transforms:
/// `a ∘ b` — apply `b` in `a`'s frame, then express the result in `a`'s
/// parent frame.
pub fn combine(a: Pose2D, b: Pose2D) -> Pose2D {
    let (sin_a, cos_a) = a.yaw.sin_cos();
    Pose2D {
        x: a.x + cos_a * b.x - sin_a * b.y,
        y: a.y + sin_a * b.x + cos_a * b.y,
        yaw: a.yaw + b.yaw,
    }
}

/// Inverse of a planar rigid transform: `combine(invert(t), t) ≈ identity`.
pub fn invert(t: Pose2D) -> Pose2D {
    let (sin_y, cos_y) = t.yaw.sin_cos();
    Pose2D { x: -cos_y * t.x - sin_y * t.y, y: sin_y * t.x - cos_y * t.y, yaw: -t.yaw }
}

/// A quaternion rotation, wire format `{x, y, z, w}` (ROS convention).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "one")]
    pub w: f64,
}

fn one() -> f64 {
    1.0
}

/// Extract yaw (rotation about the Z axis) from a quaternion.
pub fn yaw_from_quaternion(q: Quaternion) -> f64 {
    (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z))
}

/// Whether a transform should be treated as stale relative to a reference
/// stamp (spec.md I6 / §4.3): true iff the transform exists, has a non-zero
/// stamp, a reference stamp is present, and the two differ by more than
/// `threshold_ms`.
pub fn is_stale(tf_stamp_ms: Option<i64>, reference_stamp_ms: Option<i64>, threshold_ms: i64) -> bool {
    let Some(tf) = tf_stamp_ms else {
        return false;
    };
    if tf == 0 {
        return false;
    }
    let Some(reference) = reference_stamp_ms else {
        return false;
    };
    (reference - tf).abs() > threshold_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx_eq(a: Pose2D, b: Pose2D, eps: f64) -> bool {
        (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps && (a.yaw - b.yaw).abs() < eps
    }

    #[test]
    fn combine_identity_on_right() {
        let a = Pose2D::new(1.0, 2.0, 0.3);
        let result = combine(a, Pose2D::ZERO);
        assert!(approx_eq(result, a, EPS));
    }

    #[test]
    fn combine_invert_is_identity() {
        for t in [
            Pose2D::new(0.0, 0.0, 0.0),
            Pose2D::new(1.0, 2.0, 0.5),
            Pose2D::new(-3.0, 4.5, -1.2),
            Pose2D::new(10.0, -10.0, std::f64::consts::PI / 2.0),
        ] {
            let result = combine(invert(t), t);
            assert!(approx_eq(result, Pose2D::ZERO, EPS), "t={t:?} result={result:?}");
        }
    }

    #[test]
    fn combine_rotates_then_translates() {
        // a: 90-degree rotation at origin. b: (1, 0) in a's frame should land at (0, 1).
        let a = Pose2D::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let b = Pose2D::new(1.0, 0.0, 0.0);
        let result = combine(a, b);
        assert!((result.x - 0.0).abs() < 1e-9);
        assert!((result.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_s3_laser_point() {
        // S3: mapToOdom = {0,0,pi/2}, odomPose = {1,0,0}, laserOffset = {0.12,0,0},
        // range r=1 at theta=0 -> map-frame point (0, 2.12).
        let map_to_odom = Pose2D::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let odom_pose = Pose2D::new(1.0, 0.0, 0.0);
        let laser_offset = Pose2D::new(0.12, 0.0, 0.0);
        let map_to_base = combine(map_to_odom, odom_pose);
        let map_to_laser = combine(map_to_base, laser_offset);
        let r = 1.0_f64;
        let theta = 0.0_f64;
        let point_in_laser = Pose2D::new(r * theta.cos(), r * theta.sin(), 0.0);
        let map_point = combine(map_to_laser, point_in_laser);
        assert!((map_point.x - 0.0).abs() < 1e-9, "x={}", map_point.x);
        assert!((map_point.y - 2.12).abs() < 1e-9, "y={}", map_point.y);
    }

    #[test]
    fn yaw_from_identity_quaternion_is_zero() {
        let q = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
        assert!((yaw_from_quaternion(q)).abs() < 1e-12);
    }

    #[test]
    fn yaw_from_quaternion_quarter_turn() {
        // 90 degree rotation about Z: qz = sin(pi/4), qw = cos(pi/4).
        let half = std::f64::consts::FRAC_PI_4;
        let q = Quaternion { x: 0.0, y: 0.0, z: half.sin(), w: half.cos() };
        let yaw = yaw_from_quaternion(q);
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn p9_static_stamp_never_stale() {
        assert!(!is_stale(Some(0), Some(999_999), 1200));
        assert!(!is_stale(Some(0), None, 1200));
    }

    #[test]
    fn p9_beyond_threshold_is_stale() {
        assert!(is_stale(Some(1000), Some(1000 + 1201), 1200));
        assert!(!is_stale(Some(1000), Some(1000 + 1200), 1200));
    }

    #[test]
    fn is_stale_false_when_no_stamp_at_all() {
        assert!(!is_stale(None, Some(1000), 1200));
    }

    #[test]
    fn is_stale_false_when_reference_absent() {
        assert!(!is_stale(Some(5000), None, 1200));
    }
}
