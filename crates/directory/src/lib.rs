// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Switchdir: directory service for group space switches.

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod state;
pub mod transport;
pub mod world;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DirectoryConfig;
use crate::state::DirectoryState;
use crate::transport::build_router;
use crate::world::World;

/// Run the directory server until `shutdown` is cancelled.
pub async fn run(config: DirectoryConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let world = match config.world {
        Some(ref path) => {
            let world = World::load(path)?;
            info!(
                path = %path.display(),
                spaces = world.space_count(),
                characters = world.character_count(),
                "world loaded"
            );
            world
        }
        None => {
            warn!("no --world given, starting with an empty world");
            World::new()
        }
    };

    let state = Arc::new(DirectoryState::new(config, world, shutdown.clone()));
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    info!("switchdir listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
