// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot Telemetry Gateway: maintains live bidirectional links to a fleet
//! of mobile robots and multiplexes their sensor streams to browser
//! clients over a single per-robot WebSocket (spec.md §1).

pub mod bridge;
pub mod config;
pub mod error;
pub mod inventory;
pub mod manager;
pub mod mapping;
pub mod registry;
pub mod state;
pub mod throttle;
pub mod transform;
pub mod transport;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{GatewayConfig, Tunables};
use crate::inventory::{MapStore, RobotInventory};
use crate::registry::FleetRegistry;
use crate::state::GatewayState;
use crate::transport::build_router;

/// Run the gateway until shutdown, grounded on the teacher's `lib.rs::run`.
///
/// Builds the shared [`GatewayState`], spawns the periodic Fleet Registry
/// reload loop (SPEC_FULL.md §3 "Registry reload loop"), and serves the
/// axum router with graceful shutdown on a [`CancellationToken`].
pub async fn run<I, M>(config: GatewayConfig, inventory: I, map_store: M) -> anyhow::Result<()>
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let tunables = Tunables::from(&config);

    let registry = Arc::new(FleetRegistry::new(
        inventory,
        Arc::new(map_store),
        tunables,
        config.ros_bridge_port,
        config.ros_mapping_bridge_port,
        config.mapping_fetch_timeout(),
    ));

    // Initial reconcile before serving, so the first client connection
    // after bind already sees the fleet.
    registry.reload().await?;

    spawn_reload_loop(Arc::clone(&registry), config.inventory_poll_interval(), shutdown.clone());

    let state = Arc::new(GatewayState::new(Arc::clone(&registry), config, shutdown.clone()));
    let router = build_router(state);

    info!(%addr, "robot telemetry gateway listening");
    let listener = TcpListener::bind(&addr).await?;

    let shutdown_for_serve = shutdown.clone();
    let serve_result =
        axum::serve(listener, router).with_graceful_shutdown(async move { shutdown_for_serve.cancelled().await }).await;

    // Graceful shutdown: stop every Manager before the process exits
    // (SPEC_FULL.md §3 "Graceful shutdown").
    registry.stop_all().await;
    serve_result?;
    Ok(())
}

/// Background task that calls `reload()` on a fixed interval for the
/// lifetime of the process (SPEC_FULL.md §3). `reload()` is documented as
/// idempotent and safe to call repeatedly (spec.md §4.5).
fn spawn_reload_loop<I, M>(registry: Arc<FleetRegistry<I, M>>, interval: Duration, shutdown: CancellationToken)
where
    I: RobotInventory + 'static,
    M: MapStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it, we already reloaded once.
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(err) = registry.reload().await {
                        tracing::warn!(error = %err, "fleet registry reload failed");
                    }
                }
            }
        }
    });
}
