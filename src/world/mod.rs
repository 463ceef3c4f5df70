//! World domain: entities, resources and the rules shared by client and server

pub mod harvest;
pub mod model;

pub use harvest::{within_reach, HarvestOutcome, HarvestService, HARVEST_DISTANCE};
pub use model::{
    apply_patch, Entity, EntityId, EntityPatch, Player, PlayerId, ResourceId, ResourceType,
    StaticResource, Vec2, World, WorldBounds, WorldId, DEFAULT_WORLD_SIZE,
};
