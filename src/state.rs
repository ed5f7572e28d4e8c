// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared gateway state handed to every axum route, grounded on the
//! teacher's `state.rs::MuxState`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::inventory::{MapStore, RobotInventory};
use crate::registry::FleetRegistry;

/// Shared gateway state. Generic over the Robot Inventory and Map Store
/// implementations a host binary supplies (spec.md §1's "external
/// collaborators" boundary).
pub struct GatewayState<I, M> {
    pub registry: Arc<FleetRegistry<I, M>>,
    pub config: GatewayConfig,
    pub shutdown: CancellationToken,
}

impl<I, M> GatewayState<I, M>
where
    I: RobotInventory,
    M: MapStore + 'static,
{
    pub fn new(registry: Arc<FleetRegistry<I, M>>, config: GatewayConfig, shutdown: CancellationToken) -> Self {
        Self { registry, config, shutdown }
    }
}
