//! Harvest rules and the server-side harvest write

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ResourceId, ResourceType, Vec2};
use crate::auth::OwnershipResolver;
use crate::store::inventory::HarvestWrite;
use crate::store::{EntityStore, InventoryStore, WorldStore};
use crate::sync::SyncError;

/// Max distance in meters between the acting entity and the resource
pub const HARVEST_DISTANCE: f64 = 5.0;

pub fn within_reach(entity_position: Vec2, resource_position: Vec2) -> bool {
    entity_position.distance(resource_position) <= HARVEST_DISTANCE
}

/// Result of a harvest request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestOutcome {
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
    /// Whether this request performed the transition
    pub harvested: bool,
    /// Inventory count for the resource type after the request
    pub count: u64,
}

/// Persists harvest events
#[derive(Clone)]
pub struct HarvestService {
    entities: EntityStore,
    worlds: WorldStore,
    inventory: InventoryStore,
    ownership: OwnershipResolver,
}

impl HarvestService {
    pub fn new(
        entities: EntityStore,
        worlds: WorldStore,
        inventory: InventoryStore,
        ownership: OwnershipResolver,
    ) -> Self {
        Self {
            entities,
            worlds,
            inventory,
            ownership,
        }
    }

    /// Harvest a resource on behalf of one of the player's entities.
    ///
    /// Repeating the request is a no-op that reports the current count.
    pub async fn harvest(
        &self,
        player_id: &str,
        entity_id: &str,
        resource_id: &str,
    ) -> Result<HarvestOutcome, SyncError> {
        if !self.ownership.is_owned(player_id, entity_id).await? {
            return Err(SyncError::Unauthorized {
                entity_id: entity_id.to_string(),
            });
        }

        let entity = self.entities.get(entity_id).await?;
        let resource = self.worlds.get_resource(resource_id).await?;
        if resource.world_id != entity.world_id {
            return Err(SyncError::NotFound {
                kind: "resource",
                id: resource_id.to_string(),
            });
        }

        let HarvestWrite { harvested, count } = self.inventory.harvest(player_id, resource_id).await?;

        if harvested {
            info!(
                player_id = %player_id,
                resource_id = %resource_id,
                resource_type = resource.resource_type,
                count,
                "Resource harvested"
            );
        } else {
            debug!(resource_id = %resource_id, "Resource already harvested");
        }

        Ok(HarvestOutcome {
            resource_id: resource.id,
            resource_type: resource.resource_type,
            harvested,
            count,
        })
    }
}
