//! In-process backend used for development and tests

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::world::{
    apply_patch, Entity, EntityId, EntityPatch, PlayerId, ResourceId, ResourceType,
    StaticResource, World, WorldBounds, WorldId,
};

/// Keyed tables plus the secondary indexes a relational store would keep.
///
/// The owner index is maintained separately from `Entity::owner_id` so it can
/// lag or drift the same way a real secondary index can.
#[derive(Default)]
pub struct MemoryBackend {
    entities: DashMap<EntityId, Entity>,
    owner_index: DashMap<PlayerId, BTreeSet<EntityId>>,
    world_index: DashMap<WorldId, BTreeSet<EntityId>>,
    worlds: DashMap<WorldId, World>,
    resources: DashMap<ResourceId, StaticResource>,
    inventory: DashMap<(PlayerId, ResourceType), u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_entity(&self, id: &str) -> Option<Entity> {
        self.entities.get(id).map(|e| e.value().clone())
    }

    /// Insert or replace; last write wins
    pub fn save_entity(&self, entity: Entity) {
        if let Some(previous) = self.entities.get(&entity.id) {
            if previous.owner_id != entity.owner_id {
                if let Some(mut ids) = self.owner_index.get_mut(&previous.owner_id) {
                    ids.remove(&entity.id);
                }
            }
            if previous.world_id != entity.world_id {
                if let Some(mut ids) = self.world_index.get_mut(&previous.world_id) {
                    ids.remove(&entity.id);
                }
            }
        }

        self.owner_index
            .entry(entity.owner_id.clone())
            .or_default()
            .insert(entity.id.clone());
        self.world_index
            .entry(entity.world_id.clone())
            .or_default()
            .insert(entity.id.clone());
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Merge a patch in place. Returns false when the entity is absent.
    pub fn patch_entity(&self, id: &str, patch: &EntityPatch, bounds: &WorldBounds) -> bool {
        match self.entities.get_mut(id) {
            Some(mut entry) => {
                let merged = apply_patch(entry.value(), patch, bounds);
                *entry.value_mut() = merged;
                true
            }
            None => false,
        }
    }

    pub fn entities_by_owner(&self, owner_id: &str) -> Vec<Entity> {
        self.collect_indexed(self.owner_index.get(owner_id).map(|ids| ids.clone()))
    }

    pub fn entities_by_world(&self, world_id: &str) -> Vec<Entity> {
        self.collect_indexed(self.world_index.get(world_id).map(|ids| ids.clone()))
    }

    fn collect_indexed(&self, ids: Option<BTreeSet<EntityId>>) -> Vec<Entity> {
        ids.unwrap_or_default()
            .iter()
            .filter_map(|id| self.get_entity(id))
            .collect()
    }

    /// Add an owner index entry without touching the entity record
    pub fn index_owner(&self, owner_id: &str, entity_id: &str) {
        self.owner_index
            .entry(owner_id.to_string())
            .or_default()
            .insert(entity_id.to_string());
    }

    /// Drop an owner index entry without touching the entity record
    pub fn unindex_owner(&self, owner_id: &str, entity_id: &str) {
        if let Some(mut ids) = self.owner_index.get_mut(owner_id) {
            ids.remove(entity_id);
        }
    }

    pub fn get_world(&self, id: &str) -> Option<World> {
        self.worlds.get(id).map(|w| w.value().clone())
    }

    pub fn save_world(&self, world: World) {
        self.worlds.insert(world.id.clone(), world);
    }

    pub fn get_resource(&self, id: &str) -> Option<StaticResource> {
        self.resources.get(id).map(|r| r.value().clone())
    }

    pub fn save_resource(&self, resource: StaticResource) {
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn resources_by_world(&self, world_id: &str) -> Vec<StaticResource> {
        let mut found: Vec<StaticResource> = self
            .resources
            .iter()
            .filter(|r| r.value().world_id == world_id)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Flip `harvested` and credit the player while holding the resource
    /// entry lock. `None` when absent, otherwise whether this call flipped it
    /// and the resulting count.
    pub fn harvest_into_inventory(&self, resource_id: &str, player_id: &str) -> Option<(bool, u64)> {
        let mut resource = self.resources.get_mut(resource_id)?;
        let resource_type = resource.resource_type;
        let flipped = resource.value_mut().mark_harvested();
        let count = if flipped {
            self.increment_inventory(player_id, resource_type)
        } else {
            self.inventory_count(player_id, resource_type)
        };
        Some((flipped, count))
    }

    pub fn increment_inventory(&self, player_id: &str, resource_type: ResourceType) -> u64 {
        let mut count = self
            .inventory
            .entry((player_id.to_string(), resource_type))
            .or_insert(0);
        *count += 1;
        *count
    }

    pub fn inventory_count(&self, player_id: &str, resource_type: ResourceType) -> u64 {
        self.inventory
            .get(&(player_id.to_string(), resource_type))
            .map(|c| *c.value())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Vec2;

    #[test]
    fn reassigning_owner_moves_index_entry() {
        let backend = MemoryBackend::new();
        let mut e = Entity::spawn("e1".into(), "p1".into(), "w1".into());
        backend.save_entity(e.clone());

        e.owner_id = "p2".into();
        backend.save_entity(e);

        assert!(backend.entities_by_owner("p1").is_empty());
        assert_eq!(backend.entities_by_owner("p2").len(), 1);
        assert_eq!(backend.entities_by_world("w1").len(), 1);
    }

    #[test]
    fn patch_on_missing_entity_reports_absent() {
        let backend = MemoryBackend::new();
        let patch = EntityPatch {
            position: Some(Vec2::new(1.0, 1.0)),
            ..Default::default()
        };
        assert!(!backend.patch_entity("nope", &patch, &WorldBounds::default()));
    }

    #[test]
    fn inventory_counts_per_type() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.increment_inventory("p1", 2), 1);
        assert_eq!(backend.increment_inventory("p1", 2), 2);
        assert_eq!(backend.increment_inventory("p1", 5), 1);
        assert_eq!(backend.inventory_count("p2", 2), 0);
        assert_eq!(backend.inventory_count("p1", 5), 1);
    }
}
