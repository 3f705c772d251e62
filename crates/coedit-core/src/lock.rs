//! Per-element debounce locks
//!
//! Every element carries an advisory lock that coalesces rapid repeated
//! updates from one client and auto-releases after a period of inactivity.
//! The recorded version outlives the holder, so stale replays are rejected
//! indefinitely.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::element::ElementId;

/// Default inactivity window before a held lock auto-releases.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Handle to the scheduled auto-release task owned by a lock entry.
/// Dropping it (replacement or element deletion) cancels the schedule.
#[derive(Debug)]
pub struct ReleaseHandle(JoinHandle<()>);

impl ReleaseHandle {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for ReleaseHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Lock state for a single element.
#[derive(Debug, Default)]
pub struct DebounceLock {
    held_by: Option<String>,
    version: u64,
    generation: u64,
    release: Option<ReleaseHandle>,
}

impl DebounceLock {
    pub fn held_by(&self) -> Option<&str> {
        self.held_by.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_scheduled_release(&self) -> bool {
        self.release.is_some()
    }
}

/// Outcome of a lock acquisition attempt.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Holder and version recorded; the release timer must be (re)armed with
    /// this generation.
    Acquired { generation: u64 },
    /// A different client currently holds the lock.
    HeldByOther,
    /// The submitted version is older than the recorded one.
    StaleVersion,
    /// No lock entry exists for the element.
    Missing,
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired { .. })
    }
}

/// Identifies one successful acquisition, used to arm and later match the
/// auto-release for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTicket {
    pub element_id: ElementId,
    pub generation: u64,
}

/// All element locks for one document.
#[derive(Debug)]
pub struct LockTable {
    locks: HashMap<ElementId, DebounceLock>,
    debounce: Duration,
}

impl LockTable {
    pub fn new(debounce: Duration) -> Self {
        Self {
            locks: HashMap::new(),
            debounce,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Create a fresh lock entry; called when the element is inserted.
    pub fn create(&mut self, element_id: ElementId) {
        self.locks.insert(element_id, DebounceLock::default());
    }

    /// Destroy the lock entry; called when the element is deleted. Any
    /// scheduled release is cancelled with it.
    pub fn remove(&mut self, element_id: &ElementId) {
        self.locks.remove(element_id);
    }

    pub fn get(&self, element_id: &ElementId) -> Option<&DebounceLock> {
        self.locks.get(element_id)
    }

    /// Try to acquire the lock for an update.
    ///
    /// Rejected without mutation when a different client holds it or when
    /// `next_version` is older than the recorded version. On success the
    /// holder and version are recorded and the generation is bumped; the
    /// caller is expected to (re)arm the release timer.
    pub fn acquire(
        &mut self,
        element_id: &ElementId,
        updated_by: &str,
        next_version: u64,
    ) -> LockOutcome {
        let Some(lock) = self.locks.get_mut(element_id) else {
            return LockOutcome::Missing;
        };

        if let Some(holder) = &lock.held_by {
            if holder != updated_by {
                return LockOutcome::HeldByOther;
            }
        }

        if next_version < lock.version {
            return LockOutcome::StaleVersion;
        }

        lock.held_by = Some(updated_by.to_string());
        lock.version = next_version;
        lock.generation += 1;
        LockOutcome::Acquired {
            generation: lock.generation,
        }
    }

    /// Install the scheduled auto-release task for the element, cancelling
    /// any previously scheduled one (explicit cancel-and-replace).
    pub fn arm(&mut self, element_id: &ElementId, handle: ReleaseHandle) {
        if let Some(lock) = self.locks.get_mut(element_id) {
            lock.release = Some(handle);
        }
        // if the element was deleted in the meantime, dropping the handle
        // aborts the scheduled task
    }

    /// Auto-release: clears the holder but keeps the recorded version. A
    /// generation mismatch means the lock was re-acquired after this release
    /// was scheduled, so the release is ignored.
    pub fn release(&mut self, element_id: &ElementId, generation: u64) {
        if let Some(lock) = self.locks.get_mut(element_id) {
            if lock.generation == generation {
                lock.held_by = None;
                lock.release = None;
            }
        }
    }
}
