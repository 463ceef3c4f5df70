//! WebSocket upgrade handler and per-stream session

use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::AppError;
use crate::sync::{FrameOutcome, SyncError};
use crate::util::rate_limit::FrameRateLimiter;
use crate::world::{EntityId, PlayerId};
use crate::ws::protocol::{ClientFrame, ServerFrame};

/// Frames queued for the writer before senders wait
const OUTBOUND_QUEUE: usize = 64;

/// How long the writer gets to flush after the reader stops
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session token
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Authenticate before upgrading; nothing is exchanged on failure
    match state.ownership.resolve(query.token.as_deref()) {
        Ok(player_id) => {
            info!(player_id = %player_id, "Sync stream upgrade for authenticated player");
            ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
        }
        Err(e) => {
            warn!(error = %e, "Sync stream auth failed");
            AppError::from(SyncError::from(e)).into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: PlayerId, state: AppState) {
    let connection_id = Uuid::new_v4();
    state.hub.stream_opened();
    info!(%connection_id, player_id = %player_id, "Sync stream opened");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
    let mut writer = tokio::spawn(write_loop(connection_id, ws_sink, outbound_rx));

    let mut session = StreamSession::new(connection_id, player_id.clone(), state.clone(), outbound_tx);
    session.run(ws_stream).await;
    session.finish();

    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        debug!(%connection_id, "Writer did not drain in time");
        writer.abort();
    }

    state.hub.stream_closed();
    info!(%connection_id, player_id = %player_id, "Sync stream closed");
}

/// Drain the outbound queue into the socket
async fn write_loop(
    connection_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Message>,
) {
    while let Some(msg) = outbound.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = ws_sink.send(msg).await {
            debug!(%connection_id, error = %e, "WebSocket send failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = ws_sink.close().await;
}

/// Forwards hub confirmations for one entity onto this stream
struct Observer {
    entity_id: EntityId,
    stop: oneshot::Sender<()>,
}

/// Read side of one stream plus the entity it currently drives
struct StreamSession {
    connection_id: Uuid,
    player_id: PlayerId,
    state: AppState,
    outbound: mpsc::Sender<Message>,
    limiter: FrameRateLimiter,
    observer: Option<Observer>,
}

impl StreamSession {
    fn new(
        connection_id: Uuid,
        player_id: PlayerId,
        state: AppState,
        outbound: mpsc::Sender<Message>,
    ) -> Self {
        let limiter = FrameRateLimiter::new(state.config.frame_rate_limit);
        Self {
            connection_id,
            player_id,
            state,
            outbound,
            limiter,
            observer: None,
        }
    }

    /// Reader loop with keepalive. Returns once the stream should close.
    async fn run(&mut self, mut ws_stream: SplitStream<WebSocket>) {
        let keepalive_timeout = self.state.config.keepalive_timeout;
        let mut keepalive = interval(self.state.config.keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        keepalive.tick().await;
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                incoming = ws_stream.next() => {
                    let Some(result) = incoming else {
                        debug!(connection_id = %self.connection_id, "Stream ended");
                        break;
                    };
                    match result {
                        Ok(Message::Text(text)) => {
                            last_seen = Instant::now();
                            self.handle_text(&text).await;
                        }
                        Ok(Message::Binary(_)) => {
                            last_seen = Instant::now();
                            warn!(connection_id = %self.connection_id, "Received binary message, ignoring");
                        }
                        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                            last_seen = Instant::now();
                        }
                        Ok(Message::Close(_)) => {
                            info!(connection_id = %self.connection_id, "Client initiated close");
                            break;
                        }
                        Err(e) => {
                            warn!(connection_id = %self.connection_id, error = %e, "WebSocket error");
                            break;
                        }
                    }
                }
                _ = keepalive.tick() => {
                    if last_seen.elapsed() >= keepalive_timeout {
                        info!(
                            connection_id = %self.connection_id,
                            player_id = %self.player_id,
                            "Keepalive timeout, closing stream"
                        );
                        let _ = self.outbound.try_send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "keepalive timeout".into(),
                        })));
                        break;
                    }
                    if self.outbound.send(Message::Ping(Vec::new())).await.is_err() {
                        debug!(connection_id = %self.connection_id, "Outbound queue closed");
                        break;
                    }
                }
            }
        }
    }

    /// Apply one inbound frame. Failures are scoped to the frame.
    async fn handle_text(&mut self, text: &str) {
        if !self.limiter.check() {
            warn!(connection_id = %self.connection_id, "Rate limited sync frame");
            return;
        }

        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(connection_id = %self.connection_id, error = %e, "Failed to parse sync frame");
                return;
            }
        };

        let result = self
            .state
            .sync
            .apply_frame(&self.player_id, &frame, self.connection_id)
            .await;

        match result {
            Ok(FrameOutcome::Declared(entity)) => {
                info!(
                    connection_id = %self.connection_id,
                    entity_id = %entity.id,
                    "Stream now drives entity"
                );
                self.watch(entity.id);
            }
            Ok(FrameOutcome::Confirmed(confirmation)) => {
                self.send_frame(&confirmation).await;
            }
            Err(SyncError::Unauthorized { entity_id }) => {
                warn!(
                    connection_id = %self.connection_id,
                    player_id = %self.player_id,
                    entity_id = %entity_id,
                    "Dropping frame for entity not owned by player"
                );
            }
            Err(e) => {
                warn!(
                    connection_id = %self.connection_id,
                    entity_id = %frame.entity_id,
                    error = %e,
                    "Frame failed, stream continues"
                );
            }
        }
    }

    async fn send_frame(&self, frame: &ServerFrame) {
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                warn!(connection_id = %self.connection_id, error = %e, "Failed to encode confirmation");
                return;
            }
        };
        if self.outbound.send(Message::Text(json)).await.is_err() {
            debug!(connection_id = %self.connection_id, "Outbound queue closed");
        }
    }

    /// Follow confirmations for the declared entity, replacing any previous one
    fn watch(&mut self, entity_id: EntityId) {
        if self
            .observer
            .as_ref()
            .is_some_and(|observer| observer.entity_id == entity_id)
        {
            return;
        }
        self.stop_observer();

        let hub = self.state.hub.clone();
        let mut rx = hub.subscribe(&entity_id);
        let outbound = self.outbound.clone();
        let own_origin = self.connection_id;
        let watched = entity_id.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    event = rx.recv() => match event {
                        // Skip our own confirmations; they went out directly
                        Ok(event) if event.origin == own_origin => continue,
                        Ok(event) => {
                            let Ok(json) = serde_json::to_string(&event.frame) else {
                                continue;
                            };
                            if outbound.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(
                                connection_id = %own_origin,
                                entity_id = %watched,
                                lagged_count = n,
                                "Observer lagged, skipping confirmations"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            drop(rx);
            hub.release(&watched);
        });

        self.observer = Some(Observer {
            entity_id,
            stop: stop_tx,
        });
    }

    fn stop_observer(&mut self) {
        if let Some(observer) = self.observer.take() {
            debug!(
                connection_id = %self.connection_id,
                entity_id = %observer.entity_id,
                "Stopping observer"
            );
            // The task releases its hub channel on the way out
            let _ = observer.stop.send(());
        }
    }

    /// Stop observing; dropping the session then closes the outbound queue
    fn finish(mut self) {
        self.stop_observer();
    }
}
