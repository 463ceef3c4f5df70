//! Inventory counts per player and resource type - server-side only

use serde::{Deserialize, Serialize};

use super::supabase::eq;
use super::{StoreBackend, StoreError};
use crate::world::ResourceType;

const TABLE: &str = "inventory";

/// Postgres function that flips `static_resources.harvested` when still false
/// and increments the matching inventory row in the same transaction. It
/// returns `{harvested, count}`, with `count` read after the increment.
const HARVEST_FN: &str = "harvest_resource";

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Debug, Serialize)]
struct HarvestArgs<'a> {
    p_resource_id: &'a str,
    p_player_id: &'a str,
}

/// Result of the combined resource flip and inventory increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HarvestWrite {
    /// Whether this call flipped the resource
    pub harvested: bool,
    /// Count for the resource's type after the call
    pub count: u64,
}

/// Inventory store operations
#[derive(Clone)]
pub struct InventoryStore {
    backend: StoreBackend,
}

impl InventoryStore {
    pub fn new(backend: StoreBackend) -> Self {
        Self { backend }
    }

    /// Flip the resource to harvested and credit the player, as one write.
    /// Either both happen or neither does; a repeat only reads the count.
    pub async fn harvest(&self, player_id: &str, resource_id: &str) -> Result<HarvestWrite, StoreError> {
        match &self.backend {
            StoreBackend::Memory(mem) => mem
                .harvest_into_inventory(resource_id, player_id)
                .map(|(harvested, count)| HarvestWrite { harvested, count })
                .ok_or_else(|| StoreError::not_found("resource", resource_id)),
            StoreBackend::Supabase(client) => Ok(client
                .rpc(
                    HARVEST_FN,
                    &HarvestArgs {
                        p_resource_id: resource_id,
                        p_player_id: player_id,
                    },
                )
                .await?),
        }
    }

    pub async fn count(&self, player_id: &str, resource_type: ResourceType) -> Result<u64, StoreError> {
        match &self.backend {
            StoreBackend::Memory(mem) => Ok(mem.inventory_count(player_id, resource_type)),
            StoreBackend::Supabase(client) => {
                let row: Option<CountRow> = client
                    .get_one(
                        TABLE,
                        &[
                            ("player_id", eq(player_id)),
                            ("resource_type", eq(&resource_type.to_string())),
                            ("select", "count".to_string()),
                        ],
                    )
                    .await?;
                Ok(row.map(|r| r.count).unwrap_or(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode, Uri};
    use axum::Router;
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    use super::*;
    use crate::store::{MemoryBackend, SupabaseClient};
    use crate::world::{StaticResource, Vec2};

    /// PostgREST stand-in answering every request with one canned response
    async fn postgrest(status: StatusCode, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let app = Router::new().fallback(move |method: Method, uri: Uri| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{method} {}", uri.path()));
                (status, body)
            }
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    fn supabase_store(url: &str) -> InventoryStore {
        InventoryStore::new(StoreBackend::Supabase(SupabaseClient::new(url, "key")))
    }

    #[tokio::test]
    async fn harvest_flips_and_counts_together() {
        let mem = Arc::new(MemoryBackend::new());
        mem.save_resource(StaticResource {
            id: "r1".into(),
            world_id: "w1".into(),
            resource_type: 2,
            position: Vec2::ZERO,
            harvested: false,
        });
        let store = InventoryStore::new(StoreBackend::Memory(mem.clone()));

        let first = store.harvest("p1", "r1").await.unwrap();
        assert_eq!(first, HarvestWrite { harvested: true, count: 1 });
        let again = store.harvest("p1", "r1").await.unwrap();
        assert_eq!(again, HarvestWrite { harvested: false, count: 1 });

        assert!(mem.get_resource("r1").unwrap().harvested);
        assert_eq!(store.count("p1", 2).await.unwrap(), 1);
        assert!(store.harvest("p1", "missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn supabase_harvest_is_a_single_call() {
        let (url, seen) = postgrest(StatusCode::OK, r#"{"harvested":true,"count":3}"#).await;

        let write = supabase_store(&url).harvest("p1", "r1").await.unwrap();
        assert_eq!(write, HarvestWrite { harvested: true, count: 3 });
        assert_eq!(*seen.lock(), ["POST /rest/v1/rpc/harvest_resource"]);
    }

    #[tokio::test]
    async fn failed_harvest_leaves_no_partial_write() {
        let (url, seen) = postgrest(StatusCode::SERVICE_UNAVAILABLE, "busy").await;

        let err = supabase_store(&url).harvest("p1", "r1").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        // No separate flip was sent ahead of the failed credit
        assert_eq!(*seen.lock(), ["POST /rest/v1/rpc/harvest_resource"]);
    }
}
