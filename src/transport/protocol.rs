// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Downstream client WebSocket frame shapes (spec.md §4.6, §6), grounded on
//! the teacher's `events.rs` / `transport/ws.rs` tagged-enum convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame sent from a downstream client to the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// `{type:"command", channel, data}` — invokes `RobotManager::handle_command`.
    Command {
        channel: String,
        #[serde(default)]
        data: Value,
    },
    /// `{type:"request", channel:"asset", requestId, data}` — reserved
    /// extension point, always rejected (spec.md §9).
    Request {
        channel: String,
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(default)]
        data: Value,
    },
}

/// A frame sent from the gateway to a downstream client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// `{type:"event", channel, data}` — a forwarded `channel-data` event.
    Event { channel: String, data: Value },
    /// `{type:"error", channel?, requestId?, message}`.
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { channel: None, request_id: None, message: message.into() }
    }

    pub fn channel_error(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error { channel: Some(channel.into()), request_id: None, message: message.into() }
    }

    pub fn request_error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error { channel: None, request_id: Some(request_id.into()), message: message.into() }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"failed to serialize server frame"}"#.to_owned()
        })
    }
}

/// Parse a raw client frame. Unknown/malformed shapes surface as
/// `GatewayErrorKind::Protocol` per spec.md §7 ("Unsupported message type").
pub fn parse_client_frame(text: &str) -> Result<ClientFrame, String> {
    serde_json::from_str(text).map_err(|_| "Unsupported message type".to_owned())
}
