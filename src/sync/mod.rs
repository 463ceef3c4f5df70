//! Server side of the sync channel: ownership-gated frame application

pub mod hub;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

pub use hub::{HubEvent, SyncHub};

use crate::auth::{AuthError, OwnershipResolver};
use crate::store::{EntityStore, StoreError};
use crate::world::{Entity, EntityId};
use crate::ws::protocol::{ClientFrame, ServerFrame};

/// Failures scoped to a single frame or request
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),

    #[error("entity {entity_id} is not owned by the caller")]
    Unauthorized { entity_id: EntityId },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("transient store failure: {0}")]
    TransientIo(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            StoreError::Backend(e) => Self::TransientIo(e.to_string()),
        }
    }
}

/// Result of applying one accepted frame
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// Declaration accepted; the stream now drives this entity
    Declared(Entity),
    /// Update applied; confirmation for the author
    Confirmed(ServerFrame),
}

/// Applies client frames to the entity store.
///
/// Shared by the duplex stream and the request/response fallback so that one
/// HTTP update is exactly one stream round trip.
#[derive(Clone)]
pub struct SyncService {
    entities: EntityStore,
    ownership: OwnershipResolver,
    hub: Arc<SyncHub>,
}

impl SyncService {
    pub fn new(entities: EntityStore, ownership: OwnershipResolver, hub: Arc<SyncHub>) -> Self {
        Self {
            entities,
            ownership,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<SyncHub> {
        &self.hub
    }

    /// Gate on ownership, then either accept a declaration or apply the update,
    /// reload, publish to watchers and return the confirmation.
    pub async fn apply_frame(
        &self,
        player_id: &str,
        frame: &ClientFrame,
        origin: Uuid,
    ) -> Result<FrameOutcome, SyncError> {
        let decision = self.ownership.check(player_id, &frame.entity_id).await?;
        if !decision.is_allowed() {
            return Err(SyncError::Unauthorized {
                entity_id: frame.entity_id.clone(),
            });
        }

        if frame.is_declaration() {
            let entity = self.entities.get(&frame.entity_id).await?;
            return Ok(FrameOutcome::Declared(entity));
        }

        self.entities
            .update_position(&frame.entity_id, &frame.patch())
            .await?;
        let entity = self.entities.get(&frame.entity_id).await?;
        let confirmation = ServerFrame::from(&entity);

        let watchers = self.hub.publish(origin, confirmation.clone());
        debug!(
            player_id = %player_id,
            entity_id = %entity.id,
            watchers,
            "Frame applied"
        );

        Ok(FrameOutcome::Confirmed(confirmation))
    }

    /// Current state of every entity the player owns
    pub async fn owned_states(&self, player_id: &str) -> Result<Vec<ServerFrame>, SyncError> {
        Ok(self
            .entities
            .list_by_owner(player_id)
            .await?
            .iter()
            .map(ServerFrame::from)
            .collect())
    }

    /// Current state of the listed entities; unknown ids are omitted
    pub async fn states(&self, ids: &[EntityId]) -> Result<Vec<ServerFrame>, SyncError> {
        Ok(self
            .entities
            .get_many(ids)
            .await?
            .iter()
            .map(ServerFrame::from)
            .collect())
    }
}
