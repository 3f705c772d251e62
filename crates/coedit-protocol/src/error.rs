//! Protocol error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Unknown topic, missing field or otherwise malformed JSON. Dropped at
    /// the transport boundary, never propagated to the sender.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
