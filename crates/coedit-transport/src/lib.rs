//! coedit transport layer
//!
//! WebSocket transport for the collaborative editing engine:
//! - Accept loop and per-connection tasks
//! - Dispatch of inbound envelopes to the engine actor
//! - Broadcast fan-out of applied revisions and cursor positions

pub mod broadcast;
pub mod dispatch;
pub mod websocket;

pub use broadcast::{Broadcaster, ConnectionId, Frame};
pub use dispatch::{dispatch, DispatchError};
pub use websocket::WebSocketServer;
