//! Data store modules: entity, world and inventory records

pub mod entities;
pub mod inventory;
pub mod memory;
pub mod supabase;
pub mod worlds;

use std::sync::Arc;

use tracing::info;

pub use entities::EntityStore;
pub use inventory::InventoryStore;
pub use memory::MemoryBackend;
pub use supabase::{SupabaseClient, SupabaseError};
pub use worlds::WorldStore;

use crate::config::Config;

/// Where records live. Every store wraps one of these.
#[derive(Clone)]
pub enum StoreBackend {
    Memory(Arc<MemoryBackend>),
    Supabase(SupabaseClient),
}

impl StoreBackend {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryBackend::new()))
    }

    /// PostgREST when both Supabase settings are present, memory otherwise
    pub fn from_config(config: &Config) -> Self {
        match (&config.supabase_url, &config.supabase_service_role_key) {
            (Some(url), Some(key)) => {
                info!(url = %url, "Using Supabase store backend");
                Self::Supabase(SupabaseClient::new(url, key))
            }
            _ => {
                info!("Using in-memory store backend");
                Self::memory()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Supabase(_) => "supabase",
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("store backend failure: {0}")]
    Backend(#[from] SupabaseError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
