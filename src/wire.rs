//! JSON bodies of the request/response endpoints, shared by the router and
//! [`crate::client::ApiClient`]. Stream frames live in [`crate::ws::protocol`].

use serde::{Deserialize, Serialize};

use crate::world::{EntityId, ResourceId, ResourceType, StaticResource, Vec2};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub open_streams: usize,
    pub watched_entities: usize,
    pub store: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntityQuery {
    pub ids: Vec<EntityId>,
}

/// Static resource as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    pub position: Vec2,
    pub harvested: bool,
}

impl From<StaticResource> for ResourceView {
    fn from(resource: StaticResource) -> Self {
        Self {
            id: resource.id,
            resource_type: resource.resource_type,
            position: resource.position,
            harvested: resource.harvested,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRequest {
    pub resource_id: ResourceId,
    pub entity_id: EntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvest_request_is_camel_case() {
        let req: HarvestRequest =
            serde_json::from_str(r#"{"resourceId":"r1","entityId":"e1"}"#).unwrap();
        assert_eq!(req.resource_id, "r1");
        assert_eq!(req.entity_id, "e1");
    }
}
