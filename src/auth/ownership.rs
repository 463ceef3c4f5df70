//! Ownership resolution: which entities a caller may mutate

use tracing::warn;

use super::jwt::{verify_token, AuthError};
use crate::store::{EntityStore, StoreError};
use crate::world::{Player, PlayerId};

/// Outcome of an ownership check.
///
/// The record (`Entity.owner_id`) and the owner index are both consulted. When
/// exactly one of them claims the entity the update is allowed and a warning is
/// logged, so a lagging index never locks a player out of their own entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipDecision {
    /// Record and index agree the player owns the entity
    Owned,
    /// Record and index disagree; allowed with a warning
    AllowWithWarning { by_record: bool, by_index: bool },
    /// Neither source links the entity to the player
    NotOwned,
}

impl OwnershipDecision {
    pub fn from_sources(by_record: bool, by_index: bool) -> Self {
        match (by_record, by_index) {
            (true, true) => Self::Owned,
            (false, false) => Self::NotOwned,
            _ => Self::AllowWithWarning { by_record, by_index },
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::NotOwned)
    }
}

/// Maps credentials to players and players to the entities they may drive
#[derive(Clone)]
pub struct OwnershipResolver {
    jwt_secret: String,
    entities: EntityStore,
}

impl OwnershipResolver {
    pub fn new(jwt_secret: impl Into<String>, entities: EntityStore) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            entities,
        }
    }

    /// Resolve a credential to a player id. Fails closed.
    pub fn resolve(&self, credential: Option<&str>) -> Result<PlayerId, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;
        verify_token(token, &self.jwt_secret).map(|claims| claims.sub)
    }

    /// The player as seen through the owner index
    pub async fn player(&self, player_id: &str) -> Result<Player, StoreError> {
        let entity_ids = self
            .entities
            .list_by_owner(player_id)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        Ok(Player {
            id: player_id.to_string(),
            entity_ids,
        })
    }

    /// Check both ownership sources for an entity
    pub async fn check(
        &self,
        player_id: &str,
        entity_id: &str,
    ) -> Result<OwnershipDecision, StoreError> {
        let entity = self.entities.get(entity_id).await?;
        let by_record = entity.owner_id == player_id;
        let by_index = self
            .player(player_id)
            .await?
            .entity_ids
            .iter()
            .any(|id| id == entity_id);

        let decision = OwnershipDecision::from_sources(by_record, by_index);
        if let OwnershipDecision::AllowWithWarning { by_record, by_index } = decision {
            warn!(
                player_id = %player_id,
                entity_id = %entity_id,
                record_owner = %entity.owner_id,
                by_record,
                by_index,
                "Ownership record and owner index disagree, allowing update"
            );
        }
        Ok(decision)
    }

    pub async fn is_owned(&self, player_id: &str, entity_id: &str) -> Result<bool, StoreError> {
        Ok(self.check(player_id, entity_id).await?.is_allowed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{sign_token, JwtClaims};
    use crate::store::{MemoryBackend, StoreBackend};
    use crate::world::{Entity, WorldBounds};
    use std::sync::Arc;

    const SECRET: &str = "secret";

    async fn fixture() -> (Arc<MemoryBackend>, OwnershipResolver) {
        let mem = Arc::new(MemoryBackend::new());
        let entities = EntityStore::new(StoreBackend::Memory(mem.clone()), WorldBounds::default());
        entities
            .save(Entity::spawn("e1".into(), "p1".into(), "w1".into()))
            .await
            .unwrap();
        (mem, OwnershipResolver::new(SECRET, entities))
    }

    #[test]
    fn resolve_requires_a_valid_token() {
        let resolver = OwnershipResolver::new(
            SECRET,
            EntityStore::new(StoreBackend::memory(), WorldBounds::default()),
        );
        let token = sign_token(&JwtClaims::for_player("p1", 60), SECRET).unwrap();

        assert_eq!(resolver.resolve(Some(&token)).unwrap(), "p1");
        assert!(matches!(
            resolver.resolve(None),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            resolver.resolve(Some("  ")),
            Err(AuthError::MissingCredential)
        ));
        assert!(resolver.resolve(Some("junk")).is_err());
    }

    #[tokio::test]
    async fn owner_is_allowed() {
        let (_, resolver) = fixture().await;
        assert_eq!(
            resolver.check("p1", "e1").await.unwrap(),
            OwnershipDecision::Owned
        );
        assert_eq!(resolver.player("p1").await.unwrap().entity_ids, ["e1".to_string()]);
    }

    #[tokio::test]
    async fn stranger_is_rejected() {
        let (_, resolver) = fixture().await;
        assert_eq!(
            resolver.check("p2", "e1").await.unwrap(),
            OwnershipDecision::NotOwned
        );
        assert!(!resolver.is_owned("p2", "e1").await.unwrap());
    }

    #[tokio::test]
    async fn index_only_claim_is_soft_allowed() {
        let (mem, resolver) = fixture().await;
        mem.index_owner("p2", "e1");

        let decision = resolver.check("p2", "e1").await.unwrap();
        assert_eq!(
            decision,
            OwnershipDecision::AllowWithWarning {
                by_record: false,
                by_index: true
            }
        );
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn record_only_claim_is_soft_allowed() {
        let (mem, resolver) = fixture().await;
        mem.unindex_owner("p1", "e1");

        assert_eq!(
            resolver.check("p1", "e1").await.unwrap(),
            OwnershipDecision::AllowWithWarning {
                by_record: true,
                by_index: false
            }
        );
    }

    #[tokio::test]
    async fn missing_entity_is_not_found() {
        let (_, resolver) = fixture().await;
        assert!(resolver.check("p1", "nope").await.unwrap_err().is_not_found());
    }
}
