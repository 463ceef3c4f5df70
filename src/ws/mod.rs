//! Duplex sync stream over WebSocket

pub mod handler;
pub mod protocol;

pub use protocol::{ClientFrame, ServerFrame};
