//! Sync channel wire types
//! Field names and optionality are shared with existing clients; keep them stable.

use serde::{Deserialize, Serialize};

use crate::world::{Entity, EntityId, EntityPatch, Vec2};

/// Frame sent from client to server.
///
/// A frame carrying only `entityId` declares which entity the stream drives.
/// Any other frame is a partial position update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFrame {
    pub entity_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving: Option<bool>,
}

impl ClientFrame {
    /// Declaration of intent to drive an entity
    pub fn declare(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            position: None,
            target: None,
            moving: None,
        }
    }

    pub fn update(
        entity_id: impl Into<EntityId>,
        position: Vec2,
        target: Option<Vec2>,
        moving: Option<bool>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            position: Some(position),
            target,
            moving,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.patch().is_empty()
    }

    pub fn patch(&self) -> EntityPatch {
        EntityPatch {
            position: self.position,
            target: self.target,
            moving: self.moving,
        }
    }
}

/// Confirmed entity state sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFrame {
    pub entity_id: EntityId,
    pub position: Vec2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec2>,
    pub moving: bool,
}

impl From<&Entity> for ServerFrame {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_id: entity.id.clone(),
            position: entity.position,
            target: entity.target,
            moving: entity.moving,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declaration_carries_only_entity_id() {
        let frame = ClientFrame::declare("e1");
        assert_eq!(serde_json::to_value(&frame).unwrap(), json!({"entityId": "e1"}));
        assert!(frame.is_declaration());
    }

    #[test]
    fn update_frame_wire_shape() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "entityId": "e1",
            "position": {"x": 1.0, "y": 1.0}
        }))
        .unwrap();
        assert!(!frame.is_declaration());
        assert_eq!(frame.position, Some(Vec2::new(1.0, 1.0)));
        assert_eq!(frame.target, None);
        assert_eq!(frame.moving, None);
    }

    #[test]
    fn confirmation_wire_shape() {
        let mut entity = Entity::spawn("e1".into(), "p1".into(), "w1".into());
        entity.position = Vec2::new(2.5, -1.0);
        entity.target = Some(Vec2::new(3.0, 0.0));
        entity.moving = true;

        assert_eq!(
            serde_json::to_value(ServerFrame::from(&entity)).unwrap(),
            json!({
                "entityId": "e1",
                "position": {"x": 2.5, "y": -1.0},
                "target": {"x": 3.0, "y": 0.0},
                "moving": true
            })
        );

        entity.target = None;
        let value = serde_json::to_value(ServerFrame::from(&entity)).unwrap();
        assert!(value.get("target").is_none());
    }
}
