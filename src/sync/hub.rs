//! Fan-out of confirmed entity state to every stream watching that entity

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::world::EntityId;
use crate::ws::protocol::ServerFrame;

/// Buffered confirmations per watched entity before slow observers lag
const CHANNEL_CAPACITY: usize = 64;

/// A confirmation plus the stream that caused it
#[derive(Debug, Clone)]
pub struct HubEvent {
    pub origin: Uuid,
    pub frame: ServerFrame,
}

/// Registry of per-entity broadcast channels
pub struct SyncHub {
    channels: DashMap<EntityId, broadcast::Sender<HubEvent>>,
    open_streams: AtomicUsize,
}

impl SyncHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            open_streams: AtomicUsize::new(0),
        }
    }

    /// Watch confirmations for an entity
    pub fn subscribe(&self, entity_id: &str) -> broadcast::Receiver<HubEvent> {
        self.channels
            .entry(entity_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish a confirmation. Returns how many watchers received it.
    pub fn publish(&self, origin: Uuid, frame: ServerFrame) -> usize {
        let Some(tx) = self.channels.get(&frame.entity_id).map(|tx| tx.clone()) else {
            return 0;
        };
        tx.send(HubEvent { origin, frame }).unwrap_or(0)
    }

    /// Drop the channel once nobody watches it
    pub fn release(&self, entity_id: &str) {
        self.channels
            .remove_if(entity_id, |_, tx| tx.receiver_count() == 0);
    }

    pub fn watched_entities(&self) -> usize {
        self.channels.len()
    }

    pub fn stream_opened(&self) {
        self.open_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_closed(&self) {
        self.open_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::Relaxed)
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}
