//! Real-time entity position sync for a shared 2D harvesting world.
//!
//! The server half (`http`, `ws`, `sync`, `store`, `auth`) accepts position
//! updates from the owner of an entity, persists them and fans confirmations
//! out to observers. The `client` half holds the fixed-step simulation, the
//! camera transform and input handling that drive those updates.

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod store;
pub mod sync;
pub mod util;
pub mod wire;
pub mod world;
pub mod ws;

pub use app::AppState;
pub use config::Config;
pub use http::build_router;
