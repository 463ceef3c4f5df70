//! Entity records keyed by id, indexed by owner and world

use tracing::debug;

use super::supabase::{eq, in_list};
use super::{StoreBackend, StoreError};
use crate::world::{Entity, EntityId, EntityPatch, WorldBounds};

const TABLE: &str = "entities";

/// Entity store operations.
///
/// Writes are last-write-wins per id; there is no version check.
#[derive(Clone)]
pub struct EntityStore {
    backend: StoreBackend,
    bounds: WorldBounds,
}

impl EntityStore {
    pub fn new(backend: StoreBackend, bounds: WorldBounds) -> Self {
        Self { backend, bounds }
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Get an entity by id
    pub async fn get(&self, id: &str) -> Result<Entity, StoreError> {
        let found = match &self.backend {
            StoreBackend::Memory(mem) => mem.get_entity(id),
            StoreBackend::Supabase(client) => {
                client
                    .get_one::<Entity>(TABLE, &[("id", eq(id))])
                    .await?
            }
        };
        found.ok_or_else(|| StoreError::not_found("entity", id))
    }

    /// Fetch every listed entity that exists, in request order
    pub async fn get_many(&self, ids: &[EntityId]) -> Result<Vec<Entity>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match &self.backend {
            StoreBackend::Memory(mem) => Ok(ids.iter().filter_map(|id| mem.get_entity(id)).collect()),
            StoreBackend::Supabase(client) => {
                let filter = [("id", format!("in.{}", in_list(ids.iter().map(String::as_str))))];
                let rows: Vec<Entity> = client.get(TABLE, &filter).await?;
                Ok(ids
                    .iter()
                    .filter_map(|id| rows.iter().find(|e| &e.id == id).cloned())
                    .collect())
            }
        }
    }

    /// Insert or replace a full record (clamped to the world)
    pub async fn save(&self, entity: Entity) -> Result<(), StoreError> {
        let entity = entity.clamped(&self.bounds);
        match &self.backend {
            StoreBackend::Memory(mem) => {
                mem.save_entity(entity);
                Ok(())
            }
            StoreBackend::Supabase(client) => {
                client.upsert(TABLE, &entity, "id").await?;
                Ok(())
            }
        }
    }

    /// Partial merge of position/target/moving; unspecified fields keep their value
    pub async fn update_position(&self, id: &str, patch: &EntityPatch) -> Result<(), StoreError> {
        let patch = patch.clamped(&self.bounds);
        if patch.is_empty() {
            // Nothing to write, but the entity still has to exist
            return self.get(id).await.map(|_| ());
        }

        let applied = match &self.backend {
            StoreBackend::Memory(mem) => mem.patch_entity(id, &patch, &self.bounds),
            StoreBackend::Supabase(client) => {
                let rows: Vec<Entity> = client
                    .update_returning(TABLE, &[("id", eq(id))], &patch)
                    .await?;
                !rows.is_empty()
            }
        };

        if !applied {
            return Err(StoreError::not_found("entity", id));
        }
        debug!(entity_id = %id, ?patch, "Entity position updated");
        Ok(())
    }

    pub async fn list_by_owner(&self, player_id: &str) -> Result<Vec<Entity>, StoreError> {
        match &self.backend {
            StoreBackend::Memory(mem) => Ok(mem.entities_by_owner(player_id)),
            StoreBackend::Supabase(client) => Ok(client
                .get(TABLE, &[("owner_id", eq(player_id)), ("order", "id".to_string())])
                .await?),
        }
    }

    pub async fn list_by_world(&self, world_id: &str) -> Result<Vec<Entity>, StoreError> {
        match &self.backend {
            StoreBackend::Memory(mem) => Ok(mem.entities_by_world(world_id)),
            StoreBackend::Supabase(client) => Ok(client
                .get(TABLE, &[("world_id", eq(world_id)), ("order", "id".to_string())])
                .await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Vec2;

    fn store() -> EntityStore {
        EntityStore::new(StoreBackend::memory(), WorldBounds::new(6400.0))
    }

    #[tokio::test]
    async fn get_missing_entity_is_not_found() {
        let err = store().get("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_position_merges_and_clamps() {
        let store = store();
        let mut e = Entity::spawn("e1".into(), "p1".into(), "w1".into());
        e.target = Some(Vec2::new(5.0, 5.0));
        store.save(e).await.unwrap();

        store
            .update_position(
                "e1",
                &EntityPatch {
                    position: Some(Vec2::new(9999.0, -1.0)),
                    moving: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let e = store.get("e1").await.unwrap();
        assert_eq!(e.position, Vec2::new(3200.0, -1.0));
        assert_eq!(e.target, Some(Vec2::new(5.0, 5.0)));
        assert!(e.moving);
    }

    #[tokio::test]
    async fn later_write_wins() {
        let store = store();
        store
            .save(Entity::spawn("e1".into(), "p1".into(), "w1".into()))
            .await
            .unwrap();

        for x in [3.0, 1.0] {
            store
                .update_position(
                    "e1",
                    &EntityPatch {
                        position: Some(Vec2::new(x, 0.0)),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        assert_eq!(store.get("e1").await.unwrap().position, Vec2::new(1.0, 0.0));
    }

    #[tokio::test]
    async fn update_missing_entity_is_not_found() {
        let err = store()
            .update_position(
                "ghost",
                &EntityPatch {
                    moving: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn listing_by_owner_and_world() {
        let store = store();
        store
            .save(Entity::spawn("a".into(), "p1".into(), "w1".into()))
            .await
            .unwrap();
        store
            .save(Entity::spawn("b".into(), "p1".into(), "w2".into()))
            .await
            .unwrap();
        store
            .save(Entity::spawn("c".into(), "p2".into(), "w1".into()))
            .await
            .unwrap();

        let owned: Vec<_> = store
            .list_by_owner("p1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(owned, vec!["a", "b"]);

        let in_world: Vec<_> = store
            .list_by_world("w1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(in_world, vec!["a", "c"]);

        let many = store
            .get_many(&["c".to_string(), "zzz".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].id, "c");
    }
}
