// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use telemetry_gateway::config::GatewayConfig;
use telemetry_gateway::inventory::{InMemoryInventory, InMemoryMapStore};

/// Standalone entry point. A production deployment supplies its own
/// [`telemetry_gateway::inventory::RobotInventory`] / `MapStore`
/// implementation (backed by its real fleet database) and calls
/// `telemetry_gateway::run` directly; this binary wires up the in-memory
/// test doubles that ship with the crate so the gateway is runnable
/// standalone (spec.md §1 Non-goals: no database schema in this crate).
#[tokio::main]
async fn main() {
    let config = GatewayConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let inventory = InMemoryInventory::new(Vec::new());
    let map_store = InMemoryMapStore::default();

    if let Err(e) = telemetry_gateway::run(config, inventory, map_store).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
