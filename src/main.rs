//! Harvest sync server
//!
//! Entry point for the position sync server. It serves:
//! - the `/ws` duplex stream for entity position updates
//! - HTTP fallback endpoints for entity state and single updates
//! - the harvest endpoint

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvest_sync::config::{Config, LogFormat};
use harvest_sync::util::time::init_server_time;
use harvest_sync::world::PlayerId;
use harvest_sync::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level, config.log_format);
    init_server_time();

    info!("Starting harvest sync server");
    info!("Server address: {}", config.server_addr);

    let state = AppState::new(config.clone());
    info!(store = state.backend.name(), world_size = config.world_size, "Store ready");

    if let Some(player_id) = &config.seed_player_id {
        seed_world(&state, player_id).await;
    }

    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Sync stream endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create a world for the configured player unless they already own an entity
async fn seed_world(state: &AppState, player_id: &PlayerId) {
    match state.entities.list_by_owner(player_id).await {
        Ok(existing) if !existing.is_empty() => {
            info!(player_id = %player_id, entities = existing.len(), "Seed player already has a world");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(player_id = %player_id, error = %e, "Could not check seed player's entities");
            return;
        }
    }

    let seed = rand::random::<u64>();
    match state.worlds.create_world(player_id, seed).await {
        Ok(setup) => info!(
            player_id = %player_id,
            world_id = %setup.world.id,
            entity_id = %setup.main_entity.id,
            resources = setup.resources.len(),
            "Seeded world"
        ),
        Err(e) => warn!(player_id = %player_id, error = %e, "Failed to seed world"),
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
