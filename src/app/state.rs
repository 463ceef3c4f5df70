//! Application state shared across routes

use std::sync::Arc;

use crate::auth::OwnershipResolver;
use crate::config::Config;
use crate::store::{EntityStore, InventoryStore, StoreBackend, WorldStore};
use crate::sync::{SyncHub, SyncService};
use crate::world::{HarvestService, WorldBounds};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: StoreBackend,
    pub entities: EntityStore,
    pub worlds: WorldStore,
    pub inventory: InventoryStore,
    pub ownership: OwnershipResolver,
    pub hub: Arc<SyncHub>,
    pub sync: SyncService,
    pub harvest: HarvestService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let backend = StoreBackend::from_config(&config);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: Config, backend: StoreBackend) -> Self {
        let config = Arc::new(config);
        let bounds = WorldBounds::new(config.world_size);

        // Initialize stores
        let entities = EntityStore::new(backend.clone(), bounds);
        let worlds = WorldStore::new(backend.clone(), entities.clone());
        let inventory = InventoryStore::new(backend.clone());

        let ownership = OwnershipResolver::new(config.jwt_secret.clone(), entities.clone());

        // Initialize sync fan-out and services
        let hub = Arc::new(SyncHub::new());
        let sync = SyncService::new(entities.clone(), ownership.clone(), hub.clone());
        let harvest = HarvestService::new(
            entities.clone(),
            worlds.clone(),
            inventory.clone(),
            ownership.clone(),
        );

        Self {
            config,
            backend,
            entities,
            worlds,
            inventory,
            ownership,
            hub,
            sync,
            harvest,
        }
    }
}
