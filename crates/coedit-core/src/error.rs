//! Error types for the coedit core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("position {index} out of range for document of {len} elements")]
    OutOfRangeIndex { index: usize, len: usize },

    #[error("engine task is no longer running")]
    EngineClosed,
}

/// Result type alias for coedit core operations
pub type Result<T> = std::result::Result<T, Error>;
