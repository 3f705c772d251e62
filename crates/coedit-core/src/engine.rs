//! Operational transformation engine
//!
//! Owns the live document state, the revision history and the element lock
//! table. The engine is a plain synchronous struct: all mutation is expected
//! to happen on one serialized context (see [`crate::actor`]), so no internal
//! locking is used.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::element::{Element, ElementId};
use crate::error::{Error, Result};
use crate::lock::{LockOutcome, LockTable, LockTicket, ReleaseHandle, DEFAULT_DEBOUNCE};
use crate::operation::{Operation, Revision};

/// Read-only view of the document for the surrounding API layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    /// Revision number the next submission should carry.
    pub next_revision: usize,
    pub elements: Vec<Element>,
}

/// Result of applying a revision: the canonical (possibly transformed)
/// revision to broadcast, plus the lock acquisitions whose release timers
/// must be (re)armed.
#[derive(Debug)]
pub struct Applied {
    pub revision: Revision,
    pub acquired: Vec<LockTicket>,
}

/// The OT engine for a single live document.
#[derive(Debug)]
pub struct Engine {
    /// Current document state: contiguous, each element identity at most once.
    elements: Vec<Element>,
    /// Append-only log of applied revisions, in application order.
    revisions: Vec<Revision>,
    locks: LockTable,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            elements: Vec::new(),
            revisions: Vec::new(),
            locks: LockTable::new(debounce),
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub fn debounce(&self) -> Duration {
        self.locks.debounce()
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            next_revision: self.revisions.len(),
            elements: self.elements.clone(),
        }
    }

    /// Apply an incoming revision, transforming it against every revision
    /// appended since the client last observed the document.
    ///
    /// Fast path: a revision numbered exactly at the end of the store saw the
    /// latest state and needs no transform. Otherwise each non-update
    /// operation is folded through the concurrent operations in store order;
    /// update operations pass through untouched (their conflicts are settled
    /// by the lock table at application time). The returned revision is the
    /// canonical one to broadcast.
    pub fn apply(&mut self, revision: Revision) -> Applied {
        if revision.number == self.revisions.len() {
            return self.apply_revision(revision);
        }

        let concurrent: Vec<Operation> = self
            .revisions
            .get(revision.number..)
            .unwrap_or(&[])
            .iter()
            .flat_map(|r| r.operations.iter().cloned())
            .collect();

        let mut operations = Vec::with_capacity(revision.operations.len());
        for operation in revision.operations {
            if matches!(operation, Operation::Update { .. }) {
                operations.push(operation);
                continue;
            }

            match concurrent
                .iter()
                .fold(Some(operation), |op, c| Self::transform(op, c))
            {
                Some(transformed) => operations.push(transformed),
                // tombstoned (duplicate delete); siblings are unaffected
                None => debug!(number = revision.number, "operation tombstoned"),
            }
        }

        self.apply_revision(Revision::new(self.revisions.len(), operations))
    }

    /// Transform one pending operation against one already-applied concurrent
    /// operation. `None` marks a tombstoned operation and stays tombstoned
    /// through the remaining folds.
    fn transform(operation: Option<Operation>, concurrent: &Operation) -> Option<Operation> {
        let operation = operation?;

        match (operation, concurrent) {
            (
                Operation::Insert {
                    position_idx,
                    element,
                },
                Operation::Insert {
                    position_idx: concurrent_idx,
                    ..
                },
            ) => {
                // tie-break: an incoming insert at the same position yields
                // ground to the already-applied one and shifts right
                let position_idx = if position_idx < *concurrent_idx {
                    position_idx
                } else {
                    position_idx + 1
                };
                Some(Operation::Insert {
                    position_idx,
                    element,
                })
            }
            (
                Operation::Insert {
                    position_idx,
                    element,
                },
                Operation::Delete {
                    position_idx: concurrent_idx,
                },
            ) => {
                let position_idx = if position_idx <= *concurrent_idx {
                    position_idx
                } else {
                    position_idx - 1
                };
                Some(Operation::Insert {
                    position_idx,
                    element,
                })
            }
            (
                Operation::Delete { position_idx },
                Operation::Insert {
                    position_idx: concurrent_idx,
                    ..
                },
            ) => {
                let position_idx = if position_idx < *concurrent_idx {
                    position_idx
                } else {
                    position_idx + 1
                };
                Some(Operation::Delete { position_idx })
            }
            (
                Operation::Delete { position_idx },
                Operation::Delete {
                    position_idx: concurrent_idx,
                },
            ) => {
                if position_idx < *concurrent_idx {
                    Some(Operation::Delete { position_idx })
                } else if position_idx == *concurrent_idx {
                    // duplicate delete is idempotent
                    None
                } else {
                    Some(Operation::Delete {
                        position_idx: position_idx - 1,
                    })
                }
            }
            // updates never change ordering, in either role
            (operation, Operation::Update { .. }) => Some(operation),
            (operation @ Operation::Update { .. }, _) => Some(operation),
        }
    }

    /// Apply a revision that needs no (further) transformation, then append
    /// it to the store. Per-operation failures are absorbed here: an
    /// out-of-range index or a rejected lock drops that operation's effect
    /// without disturbing its siblings or the process.
    fn apply_revision(&mut self, revision: Revision) -> Applied {
        let mut acquired = Vec::new();

        for operation in &revision.operations {
            match operation {
                Operation::Insert {
                    position_idx,
                    element,
                } => {
                    if let Err(e) = self.insert_element(element.clone(), *position_idx) {
                        warn!(element = %element.id(), error = %e, "rejecting insert");
                    }
                }
                Operation::Delete { position_idx } => {
                    self.delete_element(*position_idx);
                }
                Operation::Update {
                    element,
                    updated_by,
                    version,
                } => {
                    if let Some(ticket) = self.update_element(element.clone(), updated_by, *version)
                    {
                        acquired.push(ticket);
                    }
                }
            }
        }

        self.revisions.push(revision.clone());
        Applied { revision, acquired }
    }

    /// Insert an element at the given index and create its lock entry.
    fn insert_element(&mut self, element: Element, position_idx: usize) -> Result<()> {
        if position_idx > self.elements.len() {
            return Err(Error::OutOfRangeIndex {
                index: position_idx,
                len: self.elements.len(),
            });
        }

        self.locks.create(element.id().clone());
        self.elements.insert(position_idx, element);
        Ok(())
    }

    /// Remove the element at the given index and destroy its lock entry.
    /// No-op when the index is already empty.
    fn delete_element(&mut self, position_idx: usize) {
        if position_idx >= self.elements.len() {
            debug!(index = position_idx, "delete of empty index ignored");
            return;
        }

        let element = self.elements.remove(position_idx);
        self.locks.remove(element.id());
    }

    /// Replace an element in place, subject to lock acquisition. Returns the
    /// lock ticket when the debounce window must be (re)started.
    fn update_element(
        &mut self,
        element: Element,
        updated_by: &str,
        version: u64,
    ) -> Option<LockTicket> {
        let element_id = element.id().clone();

        match self.locks.acquire(&element_id, updated_by, version) {
            LockOutcome::Acquired { generation } => {
                if let Some(existing) = self.elements.iter_mut().find(|e| *e.id() == element_id) {
                    *existing = element;
                }
                Some(LockTicket {
                    element_id,
                    generation,
                })
            }
            LockOutcome::HeldByOther | LockOutcome::StaleVersion => {
                warn!(element = %element_id, updated_by, version, "failed to acquire lock, dropping update");
                None
            }
            LockOutcome::Missing => {
                // locks are created with the element; a missing entry means
                // the element is gone, so the update has nothing to land on
                debug!(element = %element_id, "update for unknown element ignored");
                None
            }
        }
    }

    /// Auto-release callback target; executes on the same serialized context
    /// as `apply`.
    pub fn release_lock(&mut self, element_id: &ElementId, generation: u64) {
        self.locks.release(element_id, generation);
    }

    /// Install the scheduled release task for an element's lock,
    /// cancel-and-replace.
    pub fn arm_release(&mut self, element_id: &ElementId, handle: ReleaseHandle) {
        self.locks.arm(element_id, handle);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(id: &str) -> Element {
        Element::Shape {
            id: ElementId::new(id),
            top: 0.0,
            left: 0.0,
        }
    }

    fn shape_at(id: &str, top: f64) -> Element {
        Element::Shape {
            id: ElementId::new(id),
            top,
            left: 0.0,
        }
    }

    fn insert(position_idx: usize, id: &str) -> Operation {
        Operation::Insert {
            position_idx,
            element: shape(id),
        }
    }

    fn ids(engine: &Engine) -> Vec<&str> {
        engine.elements().iter().map(|e| e.id().as_str()).collect()
    }

    #[test]
    fn test_fast_path_applies_unchanged() {
        let mut engine = Engine::new();

        let revision = Revision::new(0, vec![insert(0, "a")]);
        let applied = engine.apply(revision.clone());

        assert_eq!(applied.revision, revision);
        assert_eq!(engine.revisions().len(), 1);
        assert_eq!(ids(&engine), vec!["a"]);
    }

    #[test]
    fn test_concurrent_inserts_at_same_position() {
        let mut engine = Engine::new();

        // both clients insert at position 0, based on the empty document
        engine.apply(Revision::new(0, vec![insert(0, "x")]));
        let applied = engine.apply(Revision::new(0, vec![insert(0, "y")]));

        // the late insert yields ground and lands one to the right
        assert_eq!(applied.revision.number, 1);
        assert_eq!(applied.revision.operations, vec![insert(1, "y")]);
        assert_eq!(ids(&engine), vec!["x", "y"]);
    }

    #[test]
    fn test_concurrent_deletes_are_idempotent() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));

        // both clients delete index 0, based on revision 1
        engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 0 }]));
        let applied = engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 0 }]));

        // the duplicate is tombstoned: an empty revision is appended
        assert_eq!(applied.revision.number, 2);
        assert!(applied.revision.operations.is_empty());
        assert!(engine.elements().is_empty());
        assert_eq!(engine.revisions().len(), 3);
    }

    #[test]
    fn test_delete_shifts_right_past_concurrent_insert() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(
            0,
            vec![insert(0, "a"), insert(1, "b"), insert(2, "c")],
        ));
        // concurrent insert of x at index 1 -> [a, x, b, c]
        engine.apply(Revision::new(1, vec![insert(1, "x")]));

        // pending delete of c (index 2 as of revision 1)
        let applied = engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 2 }]));

        assert_eq!(
            applied.revision.operations,
            vec![Operation::Delete { position_idx: 3 }]
        );
        assert_eq!(ids(&engine), vec!["a", "x", "b"]);
    }

    #[test]
    fn test_insert_shifts_left_past_concurrent_delete() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a"), insert(1, "b")]));
        // concurrent delete of a -> [b]
        engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 0 }]));

        // pending insert after b (index 2 as of revision 1)
        let applied = engine.apply(Revision::new(1, vec![insert(2, "c")]));

        assert_eq!(applied.revision.operations, vec![insert(1, "c")]);
        assert_eq!(ids(&engine), vec!["b", "c"]);
    }

    #[test]
    fn test_tombstone_does_not_disturb_siblings() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a"), insert(1, "b")]));
        engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 0 }]));

        // one revision carrying a duplicate delete and a fresh insert
        let applied = engine.apply(Revision::new(
            1,
            vec![Operation::Delete { position_idx: 0 }, insert(2, "c")],
        ));

        // the delete cancels, the insert still transforms and applies
        assert_eq!(applied.revision.operations, vec![insert(1, "c")]);
        assert_eq!(ids(&engine), vec!["b", "c"]);
    }

    #[test]
    fn test_update_passes_through_transform() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a"), insert(1, "b")]));
        engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 0 }]));

        let update = Operation::Update {
            element: shape_at("b", 42.0),
            updated_by: "alice".into(),
            version: 1,
        };
        let applied = engine.apply(Revision::new(1, vec![update.clone()]));

        assert_eq!(applied.revision.operations, vec![update]);
        assert_eq!(engine.elements()[0], shape_at("b", 42.0));
    }

    #[test]
    fn test_update_rejected_by_held_lock() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));

        engine.apply(Revision::new(
            1,
            vec![Operation::Update {
                element: shape_at("a", 1.0),
                updated_by: "alice".into(),
                version: 1,
            }],
        ));
        // bob's interleaved update is dropped while alice holds the lock
        engine.apply(Revision::new(
            2,
            vec![Operation::Update {
                element: shape_at("a", 2.0),
                updated_by: "bob".into(),
                version: 2,
            }],
        ));

        assert_eq!(engine.elements()[0], shape_at("a", 1.0));
        let lock = engine.locks().get(&ElementId::new("a")).unwrap();
        assert_eq!(lock.held_by(), Some("alice"));
        assert_eq!(lock.version(), 1);
    }

    #[test]
    fn test_update_for_unknown_element_ignored() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(
            0,
            vec![Operation::Update {
                element: shape("ghost"),
                updated_by: "alice".into(),
                version: 1,
            }],
        ));

        assert!(engine.elements().is_empty());
        assert_eq!(engine.revisions().len(), 1);
    }

    #[test]
    fn test_out_of_range_insert_rejected_without_corruption() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));

        engine.apply(Revision::new(1, vec![insert(5, "b")]));
        assert_eq!(ids(&engine), vec!["a"]);

        // subsequent valid revisions still apply
        engine.apply(Revision::new(2, vec![insert(1, "c")]));
        assert_eq!(ids(&engine), vec!["a", "c"]);
    }

    #[test]
    fn test_delete_of_empty_index_is_noop() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));

        engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 7 }]));
        assert_eq!(ids(&engine), vec!["a"]);
    }

    #[test]
    fn test_delete_destroys_lock_entry() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));
        assert!(engine.locks().get(&ElementId::new("a")).is_some());

        engine.apply(Revision::new(1, vec![Operation::Delete { position_idx: 0 }]));
        assert!(engine.locks().get(&ElementId::new("a")).is_none());
    }

    #[test]
    fn test_snapshot_reflects_applied_revisions() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));
        engine.apply(Revision::new(1, vec![insert(1, "b")]));
        engine.apply(Revision::new(2, vec![Operation::Delete { position_idx: 0 }]));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.next_revision, 3);
        assert_eq!(snapshot.elements, vec![shape("b")]);
    }

    #[test]
    fn test_stale_revision_renumbered_to_store_length() {
        let mut engine = Engine::new();
        engine.apply(Revision::new(0, vec![insert(0, "a")]));
        engine.apply(Revision::new(1, vec![insert(1, "b")]));

        let applied = engine.apply(Revision::new(0, vec![insert(0, "c")]));
        assert_eq!(applied.revision.number, 2);
        assert_eq!(engine.revisions().len(), 3);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let engine = Engine::new();
        let json = serde_json::to_value(engine.snapshot()).unwrap();
        assert_eq!(json["nextRevision"], 0);
        assert!(json["elements"].as_array().unwrap().is_empty());
    }
}
