//! Client end of the sync stream.
//!
//! A [`SyncHandle`] is one open stream driving one entity. Updates go through a
//! bounded queue drained by a writer task; confirmations arrive on a second
//! queue filled by a reader task.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::world::EntityId;
use crate::ws::protocol::{ClientFrame, ServerFrame};

/// Pending outbound frames; beyond this `send` drops
const OUTBOUND_QUEUE: usize = 32;

const CONFIRMATION_QUEUE: usize = 64;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SyncHandle {
    entity_id: EntityId,
    outbound: mpsc::Sender<Message>,
    confirmations: mpsc::Receiver<ServerFrame>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl SyncHandle {
    /// Connect to `url` (a `ws://.../ws` endpoint) and declare `entity_id`
    pub async fn open(url: &str, token: &str, entity_id: impl Into<EntityId>) -> Result<Self, ClientError> {
        let entity_id = entity_id.into();
        let (stream, _response) = connect_async(format!("{url}?token={token}")).await?;
        let (mut sink, mut source) = stream.split();

        let declaration = serde_json::to_string(&ClientFrame::declare(entity_id.clone()))?;
        sink.send(Message::Text(declaration)).await?;
        info!(entity_id = %entity_id, "Sync stream open");

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let (confirm_tx, confirm_rx) = mpsc::channel::<ServerFrame>(CONFIRMATION_QUEUE);

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = msg.is_close();
                if let Err(e) = sink.send(msg).await {
                    debug!(error = %e, "Sync send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_entity = entity_id.clone();
        let reader = tokio::spawn(async move {
            while let Some(result) = source.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(frame) => {
                            if confirm_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Unreadable confirmation"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!(entity_id = %reader_entity, "Server closed sync stream");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(entity_id = %reader_entity, error = %e, "Sync stream error");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            entity_id,
            outbound: outbound_tx,
            confirmations: confirm_rx,
            writer,
            reader,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Queue an update without waiting. A full queue drops the frame; the
    /// periodic resync repairs it.
    pub fn send(&self, frame: &ClientFrame) -> Result<(), ClientError> {
        let json = serde_json::to_string(frame)?;
        self.outbound
            .try_send(Message::Text(json))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ClientError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ClientError::Closed,
            })
    }

    /// Wait for the next confirmation. `None` once the stream is gone.
    pub async fn next_confirmation(&mut self) -> Option<ServerFrame> {
        self.confirmations.recv().await
    }

    pub fn try_confirmation(&mut self) -> Option<ServerFrame> {
        self.confirmations.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed() || self.reader.is_finished()
    }

    /// Send a close frame and wait briefly for queued frames to flush
    pub async fn close(mut self) {
        let _ = self.outbound.send(Message::Close(None)).await;
        if timeout(CLOSE_TIMEOUT, &mut self.writer).await.is_err() {
            debug!(entity_id = %self.entity_id, "Sync writer did not flush in time");
        }
        info!(entity_id = %self.entity_id, "Sync stream closed");
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}
