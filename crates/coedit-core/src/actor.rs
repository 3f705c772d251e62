//! Engine actor
//!
//! Wraps the synchronous [`Engine`] in a single-consumer command mailbox so
//! the single-writer invariant holds even on a multi-threaded runtime. Every
//! inbound message's effect on engine state is funneled through this mailbox,
//! including the debounce auto-release, which re-enters it as a command and
//! therefore can never interleave with an in-flight acquire.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::element::ElementId;
use crate::engine::{DocumentSnapshot, Engine};
use crate::error::{Error, Result};
use crate::lock::{LockTicket, ReleaseHandle};
use crate::operation::Revision;

const MAILBOX_CAPACITY: usize = 1024;

/// Commands processed by the engine actor, one at a time.
#[derive(Debug)]
pub enum EngineCommand {
    /// Apply a submitted revision; replies with the canonical revision to
    /// broadcast.
    Apply {
        revision: Revision,
        reply: oneshot::Sender<Revision>,
    },
    /// Read-only document snapshot for the query surface.
    Document {
        reply: oneshot::Sender<DocumentSnapshot>,
    },
    /// Debounce timer expiry for an element's lock.
    ReleaseLock {
        element_id: ElementId,
        generation: u64,
    },
}

/// Owns the engine and drains the command mailbox.
pub struct EngineActor {
    engine: Engine,
    rx: mpsc::Receiver<EngineCommand>,
    /// Weak self-sender for scheduled release tasks; weak so outstanding
    /// timers do not keep a closed engine alive.
    tx: mpsc::WeakSender<EngineCommand>,
}

impl EngineActor {
    /// Spawn the actor task for an engine and return a handle to it. The
    /// actor stops once every handle is dropped.
    pub fn spawn(engine: Engine) -> EngineHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = EngineActor {
            engine,
            rx,
            tx: tx.downgrade(),
        };
        tokio::spawn(actor.run());
        EngineHandle { tx }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                EngineCommand::Apply { revision, reply } => {
                    let applied = self.engine.apply(revision);
                    for ticket in applied.acquired {
                        self.schedule_release(ticket);
                    }
                    let _ = reply.send(applied.revision);
                }
                EngineCommand::Document { reply } => {
                    let _ = reply.send(self.engine.snapshot());
                }
                EngineCommand::ReleaseLock {
                    element_id,
                    generation,
                } => {
                    self.engine.release_lock(&element_id, generation);
                }
            }
        }
        debug!("engine mailbox closed, stopping");
    }

    /// Arm the debounce release for a fresh lock acquisition. The spawned
    /// task only sends a command; the release itself runs on this actor.
    fn schedule_release(&mut self, ticket: LockTicket) {
        let LockTicket {
            element_id,
            generation,
        } = ticket;
        let delay = self.engine.debounce();
        let tx = self.tx.clone();
        let id = element_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(EngineCommand::ReleaseLock {
                        element_id: id,
                        generation,
                    })
                    .await;
            }
        });

        self.engine
            .arm_release(&element_id, ReleaseHandle::new(handle));
    }
}

/// Cheap cloneable handle to the engine actor; this is what gets injected
/// into the transport and query layers.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Route a submitted revision through the engine and return the applied
    /// (possibly transformed) revision.
    pub async fn apply(&self, revision: Revision) -> Result<Revision> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Apply { revision, reply })
            .await
            .map_err(|_| Error::EngineClosed)?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Read-only query surface: current elements and the next revision
    /// number.
    pub async fn document(&self) -> Result<DocumentSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Document { reply })
            .await
            .map_err(|_| Error::EngineClosed)?;
        rx.await.map_err(|_| Error::EngineClosed)
    }
}
