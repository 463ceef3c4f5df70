//! Worlds and their static resources

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use uuid::Uuid;

use super::supabase::eq;
use super::{EntityStore, StoreBackend, StoreError};
use crate::world::{Entity, PlayerId, ResourceType, StaticResource, Vec2, World};

const WORLDS: &str = "worlds";
const RESOURCES: &str = "static_resources";

/// Resources scattered into a freshly created world
pub const RESOURCES_PER_WORLD: usize = 24;

/// Number of distinct resource kinds generated
pub const RESOURCE_KINDS: ResourceType = 4;

/// Keep generated resources away from the world edge
const SCATTER_FRACTION: f64 = 0.9;

/// Everything created alongside a new world
#[derive(Debug, Clone)]
pub struct WorldSetup {
    pub world: World,
    pub main_entity: Entity,
    pub resources: Vec<StaticResource>,
}

/// World store operations
#[derive(Clone)]
pub struct WorldStore {
    backend: StoreBackend,
    entities: EntityStore,
}

impl WorldStore {
    pub fn new(backend: StoreBackend, entities: EntityStore) -> Self {
        Self { backend, entities }
    }

    pub async fn get_world(&self, id: &str) -> Result<World, StoreError> {
        let found = match &self.backend {
            StoreBackend::Memory(mem) => mem.get_world(id),
            StoreBackend::Supabase(client) => {
                client.get_one(WORLDS, &[("id", eq(id))]).await?
            }
        };
        found.ok_or_else(|| StoreError::not_found("world", id))
    }

    pub async fn get_resource(&self, id: &str) -> Result<StaticResource, StoreError> {
        let found = match &self.backend {
            StoreBackend::Memory(mem) => mem.get_resource(id),
            StoreBackend::Supabase(client) => {
                client.get_one(RESOURCES, &[("id", eq(id))]).await?
            }
        };
        found.ok_or_else(|| StoreError::not_found("resource", id))
    }

    pub async fn list_resources(&self, world_id: &str) -> Result<Vec<StaticResource>, StoreError> {
        match &self.backend {
            StoreBackend::Memory(mem) => Ok(mem.resources_by_world(world_id)),
            StoreBackend::Supabase(client) => Ok(client
                .get(RESOURCES, &[("world_id", eq(world_id)), ("order", "id".to_string())])
                .await?),
        }
    }

    /// Create a world, its main entity at the origin, and a seeded scatter of resources
    pub async fn create_world(&self, owner_id: &PlayerId, seed: u64) -> Result<WorldSetup, StoreError> {
        let world_id = Uuid::new_v4().to_string();
        let main_entity = Entity::spawn(Uuid::new_v4().to_string(), owner_id.clone(), world_id.clone());
        let resources = scatter_resources(&world_id, seed, self.entities.bounds().half());

        let world = World {
            id: world_id,
            owner_id: owner_id.clone(),
            main_entity_id: main_entity.id.clone(),
            resource_ids: resources.iter().map(|r| r.id.clone()).collect(),
            created_at: Utc::now(),
        };

        match &self.backend {
            StoreBackend::Memory(mem) => {
                mem.save_world(world.clone());
                for resource in &resources {
                    mem.save_resource(resource.clone());
                }
            }
            StoreBackend::Supabase(client) => {
                let _: World = client.insert(WORLDS, &world).await?;
                client.upsert(RESOURCES, &resources, "id").await?;
            }
        }
        self.entities.save(main_entity.clone()).await?;

        info!(
            world_id = %world.id,
            owner_id = %owner_id,
            main_entity_id = %main_entity.id,
            resources = resources.len(),
            "World created"
        );

        Ok(WorldSetup {
            world,
            main_entity,
            resources,
        })
    }
}

fn scatter_resources(world_id: &str, seed: u64, half_size: f64) -> Vec<StaticResource> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = (half_size * SCATTER_FRACTION).max(f64::EPSILON);

    (0..RESOURCES_PER_WORLD)
        .map(|_| StaticResource {
            id: Uuid::new_v4().to_string(),
            world_id: world_id.to_string(),
            resource_type: rng.gen_range(0..RESOURCE_KINDS),
            position: Vec2::new(rng.gen_range(-extent..extent), rng.gen_range(-extent..extent)),
            harvested: false,
        })
        .collect()
}
