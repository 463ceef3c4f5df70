//! HTTP surface: health, request/response fallback and harvest

pub mod middleware;
pub mod routes;

pub use routes::{build_router, AppError};
