//! Operations and revisions

use crate::element::Element;
use serde::{Deserialize, Serialize};

/// A single edit to the document. Immutable value; transformation produces a
/// new operation rather than mutating the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Insert an element at the given index.
    Insert {
        #[serde(rename = "positionIdx")]
        position_idx: usize,
        element: Element,
    },

    /// Remove the element at the given index.
    Delete {
        #[serde(rename = "positionIdx")]
        position_idx: usize,
    },

    /// Replace an existing element in place, subject to lock acquisition.
    /// Never positionally transformed.
    Update {
        element: Element,
        #[serde(rename = "updatedBy")]
        updated_by: String,
        version: u64,
    },
}

/// A batch of operations submitted or applied together under one sequence
/// number. Immutable once appended to the revision store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub number: usize,
    pub operations: Vec<Operation>,
}

impl Revision {
    pub fn new(number: usize, operations: Vec<Operation>) -> Self {
        Self { number, operations }
    }
}
