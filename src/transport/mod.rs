// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the telemetry gateway, grounded on the
//! teacher's `transport::build_router`.

pub mod http;
pub mod protocol;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::inventory::{MapStore, RobotInventory};
use crate::state::GatewayState;

/// Build the axum `Router` with every route the gateway exposes
/// (SPEC_FULL.md §2.4): health, fleet status, and the per-robot WebSocket.
/// A permissive CORS layer stands in for the dashboard origin; downstream
/// auth is a no-op pass-through here, enforced by a surrounding layer
/// (spec.md §1 Non-goals) — a host binary can layer `axum::middleware`
/// auth in front of this router without modifying it.
pub fn build_router<I, M>(state: Arc<GatewayState<I, M>>) -> Router
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/robots", get(http::list_robots))
        .route("/ws/robots/{robot_id}", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
