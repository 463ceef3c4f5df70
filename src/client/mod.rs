//! Client half of the sync system: fixed-step simulation, camera transform,
//! input handling and the sync/fallback transports.

pub mod api;
pub mod camera;
pub mod harvest;
pub mod input;
pub mod physics;
pub mod session;
pub mod sync;

pub use api::ApiClient;
pub use camera::{Camera, ViewRect, Viewport};
pub use harvest::{find_harvestable, LocalInventory};
pub use input::{Intent, InteractionController, InteractionState, Scene};
pub use physics::{Body, PhysicsTable, SharedPhysics, SimulationLoop};
pub use session::ClientSession;
pub use sync::SyncHandle;

/// Client transport failures
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("stream connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("outbound queue full, frame dropped")]
    QueueFull,

    #[error("sync stream closed")]
    Closed,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}
