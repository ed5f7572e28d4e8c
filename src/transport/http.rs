// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain HTTP surface (SPEC_FULL.md §2.4): health and fleet status,
//! grounded on the teacher's `transport/http.rs::health` /
//! `list_sessions`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::inventory::{MapStore, RobotInventory};
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub managed_robot_count: usize,
}

/// `GET /api/v1/health` — process liveness + active manager count.
pub async fn health<I, M>(State(state): State<Arc<GatewayState<I, M>>>) -> impl IntoResponse
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    let managers = state.registry.list().await;
    Json(HealthResponse { status: "running".to_owned(), managed_robot_count: managers.len() })
}

#[derive(Debug, Serialize)]
pub struct RobotChannelStatus {
    pub name: String,
    pub error_count: u64,
    pub last_message_at_ms_ago: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RobotStatus {
    pub id: String,
    pub connections: Vec<ConnectionStatus>,
    pub channels: Vec<RobotChannelStatus>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub id: String,
    pub connected: bool,
}

/// `GET /api/v1/robots` — operational visibility into the managed fleet
/// (SPEC_FULL.md §3 "Fleet status observability"). Additive observability
/// only; it reports gateway-internal state, not the excluded CRUD surface.
pub async fn list_robots<I, M>(State(state): State<Arc<GatewayState<I, M>>>) -> impl IntoResponse
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    let managers = state.registry.list().await;
    let mut statuses = Vec::with_capacity(managers.len());
    for manager in managers {
        let connections = manager
            .config()
            .connections
            .iter()
            .map(|c| ConnectionStatus { id: c.id.clone(), connected: manager.is_connected(&c.id) })
            .collect();
        let channels = manager
            .channel_status()
            .await
            .into_iter()
            .map(|c| RobotChannelStatus {
                name: c.name,
                error_count: c.error_count,
                last_message_at_ms_ago: c.last_message_at_ms_ago,
            })
            .collect();
        statuses.push(RobotStatus { id: manager.id().to_owned(), connections, channels });
    }
    Json(statuses)
}
