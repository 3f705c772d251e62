//! coedit core - operational transformation engine
//!
//! This crate provides the collaborative editing core:
//! - Ordered element document state with an append-only revision history
//! - Pairwise operational transformation of concurrent revisions
//! - Per-element debounce locks guarding update operations
//! - A single-consumer engine actor enforcing the single-writer model

pub mod actor;
pub mod element;
pub mod engine;
pub mod error;
pub mod lock;
pub mod operation;

pub use actor::{EngineActor, EngineCommand, EngineHandle};
pub use element::{Element, ElementId};
pub use engine::{Applied, DocumentSnapshot, Engine};
pub use error::{Error, Result};
pub use lock::{DebounceLock, LockOutcome, LockTable, LockTicket, ReleaseHandle, DEFAULT_DEBOUNCE};
pub use operation::{Operation, Revision};
