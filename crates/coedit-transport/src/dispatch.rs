//! Inbound message dispatch
//!
//! Routes decoded envelopes to the engine actor and publishes the results:
//! cursor positions go to every peer except the originator, applied revisions
//! go to all peers (the originator's local view may differ from the canonical
//! transformed result).

use thiserror::Error;
use tracing::debug;

use coedit_core::EngineHandle;
use coedit_protocol::{CursorBroadcast, Inbound, InboundPayload, Outbound};

use crate::broadcast::{Broadcaster, ConnectionId};

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The engine actor is gone; the connection cannot make progress.
    #[error(transparent)]
    Engine(#[from] coedit_core::Error),

    /// An outbound frame failed to encode; the message is dropped.
    #[error(transparent)]
    Protocol(#[from] coedit_protocol::ProtocolError),
}

impl DispatchError {
    /// Whether the connection loop should terminate on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Engine(_))
    }
}

/// Handle one inbound envelope from the given connection.
pub async fn dispatch(
    connection_id: ConnectionId,
    inbound: Inbound,
    engine: &EngineHandle,
    broadcaster: &Broadcaster,
) -> Result<(), DispatchError> {
    match inbound.payload {
        InboundPayload::CursorTracking(position) => {
            debug!(conn = connection_id, session = %inbound.session_id, "forwarding cursor");
            let frame = Outbound::CursorTracking(CursorBroadcast {
                session_id: inbound.session_id,
                x: position.x,
                y: position.y,
            })
            .encode()?;
            broadcaster.publish_others(connection_id, frame);
        }
        InboundPayload::PostRevision(revision) => {
            debug!(
                conn = connection_id,
                session = %inbound.session_id,
                number = revision.number,
                "applying revision"
            );
            let applied = engine.apply(revision).await?;
            let frame = Outbound::PublishRevision(applied).encode()?;
            broadcaster.publish_all(frame);
        }
    }
    Ok(())
}
