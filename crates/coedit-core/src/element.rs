//! Document element types

use serde::{Deserialize, Serialize};

/// Element identifier - an opaque string assigned by the client that created
/// the element. The engine never interprets it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A document element: an identifier plus a type-specific payload.
///
/// Closed tagged variant - adding an element kind forces every consumer
/// (transforms, mutations, wire codec) to be revisited at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    /// A shape on the canvas, positioned by its top-left corner.
    Shape { id: ElementId, top: f64, left: f64 },
}

impl Element {
    pub fn id(&self) -> &ElementId {
        match self {
            Element::Shape { id, .. } => id,
        }
    }
}
