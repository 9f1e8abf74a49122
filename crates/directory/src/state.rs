// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use spaceswitch::CoordinatorOptions;

use crate::config::DirectoryConfig;
use crate::registry::SwitchRegistry;
use crate::world::World;

/// Shared directory state.
pub struct DirectoryState {
    pub world: Arc<World>,
    pub registry: SwitchRegistry,
    pub config: DirectoryConfig,
    pub shutdown: CancellationToken,
}

impl DirectoryState {
    pub fn new(config: DirectoryConfig, world: World, shutdown: CancellationToken) -> Self {
        let world = Arc::new(world);
        let options = CoordinatorOptions { stage_timeout: config.stage_timeout() };
        Self {
            registry: SwitchRegistry::new(Arc::clone(&world), options),
            world,
            config,
            shutdown,
        }
    }
}
