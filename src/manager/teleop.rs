// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Teleop safety envelope: clamp, twist sanitization, and the idle
//! watchdog (spec.md §4.4 "Teleop publish pipeline", I2, P5, P6).

use serde_json::Value;

/// A planar velocity command, wire shape `{linear:{x}, angular:{z}}`
/// (other twist components are always zero — spec.md §4.4 clause 2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    pub linear_x: f64,
    pub angular_z: f64,
}

impl Twist {
    pub const ZERO: Twist = Twist { linear_x: 0.0, angular_z: 0.0 };

    pub fn to_wire(self) -> Value {
        serde_json::json!({
            "linear": {"x": self.linear_x, "y": 0.0, "z": 0.0},
            "angular": {"x": 0.0, "y": 0.0, "z": self.angular_z},
        })
    }
}

/// Parse and clamp a teleop command payload (spec.md §4.4 clauses 1-2).
/// Rejects non-object payloads and those missing both `linear` and
/// `angular`. Non-numeric components become `0` rather than failing the
/// whole command, matching the spec's "non-numeric values become 0".
pub fn parse_and_clamp(payload: &Value, max_linear: f64, max_angular: f64) -> Result<Twist, &'static str> {
    let Some(obj) = payload.as_object() else {
        return Err("teleop payload must be an object");
    };
    if !obj.contains_key("linear") && !obj.contains_key("angular") {
        return Err("teleop payload missing linear/angular");
    }

    let linear_x = obj
        .get("linear")
        .and_then(|v| v.get("x"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let angular_z = obj
        .get("angular")
        .and_then(|v| v.get("z"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Ok(Twist {
        linear_x: linear_x.clamp(-max_linear, max_linear),
        angular_z: angular_z.clamp(-max_angular, max_angular),
    })
}
