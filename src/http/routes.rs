//! HTTP route definitions

use axum::{
    extract::{Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthError;
use crate::http::middleware::{require_auth, AuthenticatedPlayer};
use crate::store::StoreError;
use crate::sync::{FrameOutcome, SyncError};
use crate::util::time::uptime_secs;
use crate::wire::{EntityQuery, HarvestRequest, HealthResponse, ResourceView};
use crate::world::{EntityId, HarvestOutcome};
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{ClientFrame, ServerFrame};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CLIENT_ORIGIN may list several origins, comma separated
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes; the stream authenticates from its query string
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    let protected_routes = Router::new()
        .route("/entities", get(owned_entities_handler))
        .route("/entities/query", post(query_entities_handler))
        .route("/entities/position", post(update_position_handler))
        .route("/worlds/:world_id/resources", get(world_resources_handler))
        .route("/harvest", post(harvest_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: uptime_secs(),
        open_streams: state.hub.open_streams(),
        watched_entities: state.hub.watched_entities(),
        store: state.backend.name().to_string(),
    })
}

// ============================================================================
// Entity fallback endpoints
// ============================================================================

async fn owned_entities_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<Vec<ServerFrame>>, AppError> {
    let states = state.sync.owned_states(&auth.player_id).await?;
    Ok(Json(states))
}

async fn query_entities_handler(
    State(state): State<AppState>,
    Json(query): Json<EntityQuery>,
) -> Result<Json<Vec<ServerFrame>>, AppError> {
    let states = state.sync.states(&query.ids).await?;
    Ok(Json(states))
}

/// One stream round trip over plain HTTP. Unlike the stream, a frame for an
/// unowned entity is rejected outright.
async fn update_position_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(frame): Json<ClientFrame>,
) -> Result<Json<ServerFrame>, AppError> {
    if frame.entity_id.is_empty() {
        return Err(AppError::BadRequest("entityId is required".to_string()));
    }

    // Fresh origin so every stream watching the entity gets the confirmation
    let outcome = state
        .sync
        .apply_frame(&auth.player_id, &frame, Uuid::new_v4())
        .await?;

    let confirmation = match outcome {
        FrameOutcome::Confirmed(confirmation) => confirmation,
        FrameOutcome::Declared(entity) => ServerFrame::from(&entity),
    };
    Ok(Json(confirmation))
}

// ============================================================================
// World resources and harvest
// ============================================================================

async fn world_resources_handler(
    State(state): State<AppState>,
    Path(world_id): Path<String>,
) -> Result<Json<Vec<ResourceView>>, AppError> {
    // Surface a missing world as 404 rather than an empty list
    state.worlds.get_world(&world_id).await?;
    let resources = state.worlds.list_resources(&world_id).await?;
    Ok(Json(resources.into_iter().map(ResourceView::from).collect()))
}

async fn harvest_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(req): Json<HarvestRequest>,
) -> Result<Json<HarvestOutcome>, AppError> {
    let outcome = state
        .harvest
        .harvest(&auth.player_id, &req.entity_id, &req.resource_id)
        .await?;
    Ok(Json(outcome))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(AuthError),

    #[error("Entity {0} is not owned by the caller")]
    Unauthorized(EntityId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unauthenticated(e) => AppError::Unauthenticated(e),
            SyncError::Unauthorized { entity_id } => AppError::Unauthorized(entity_id),
            SyncError::NotFound { kind, id } => AppError::NotFound(format!("{kind} {id}")),
            SyncError::TransientIo(msg) => AppError::Unavailable(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        SyncError::from(err).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;

    async fn status_and_body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn sync_errors_map_to_statuses() {
        let (status, body) = status_and_body(
            SyncError::Unauthorized {
                entity_id: "e1".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("e1"));

        let (status, _) = status_and_body(
            SyncError::NotFound {
                kind: "entity",
                id: "e9".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            status_and_body(SyncError::Unauthenticated(AuthError::TokenExpired).into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = status_and_body(SyncError::TransientIo("timeout".into()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn router_serves_health_and_guards_entities() {
        let app = build_router(AppState::new(Config::for_tests("secret")));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.store, "memory");

        let response = app
            .oneshot(Request::builder().uri("/entities").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
