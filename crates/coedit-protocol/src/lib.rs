//! coedit wire protocol
//!
//! JSON envelopes exchanged over the WebSocket transport:
//! - Inbound: `{topic, sessionId, data}` with CursorTracking and PostRevision
//!   topics
//! - Outbound: `{topic, data}` with CursorTracking and PublishRevision topics

pub mod error;
pub mod message;

pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    decode_inbound, CursorBroadcast, CursorPosition, Inbound, InboundPayload, Outbound, Topic,
};
