//! Remote stream transports.

pub mod websocket;
pub mod wire;

pub use websocket::{WebSocketTransport, WebSocketTransportConfig};
