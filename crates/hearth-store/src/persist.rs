//! Background persistence of the entity store.
//!
//! The persister runs in its own tokio task. Writers only send a cheap
//! `Dirty` notification; the task coalesces them over a debounce window,
//! takes a snapshot under the read lock and writes it on a blocking thread.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::database::DatabaseHandle;
use crate::error::{Result, StoreError};
use crate::store::StoreHandle;

// ---------------------------------------------------------------------------
// Command type
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum PersistCommand {
    /// The store changed; schedule a write.
    Dirty,
    /// Write now and report the outcome.
    Flush(oneshot::Sender<Result<()>>),
    /// Write anything pending and stop.
    Shutdown,
}

/// Cloneable sender side of the persistence task.
#[derive(Debug, Clone)]
pub struct Persister {
    cmd_tx: mpsc::Sender<PersistCommand>,
}

impl Persister {
    /// Spawn the persistence task.
    pub fn spawn(
        db: DatabaseHandle,
        store: StoreHandle,
        debounce: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PersistCommand>(64);
        let handle = tokio::spawn(run(db, store, debounce, cmd_rx));
        (Self { cmd_tx }, handle)
    }

    /// Note that the store changed. Never blocks; if the queue is full a
    /// write is already pending.
    pub fn mark_dirty(&self) {
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.cmd_tx.try_send(PersistCommand::Dirty)
        {
            debug!("persister stopped, dropping dirty notification");
        }
    }

    /// Write the current store immediately.
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(PersistCommand::Flush(reply_tx))
            .await
            .map_err(|_| StoreError::PersisterStopped)?;
        reply_rx.await.map_err(|_| StoreError::PersisterStopped)?
    }

    /// Ask the task to write pending changes and exit.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(PersistCommand::Shutdown).await;
    }
}

async fn run(
    db: DatabaseHandle,
    store: StoreHandle,
    debounce: Duration,
    mut cmd_rx: mpsc::Receiver<PersistCommand>,
) {
    let mut deadline: Option<Instant> = None;

    info!(debounce_ms = debounce.as_millis() as u64, "persister started");

    loop {
        let pending = deadline;
        let timer = async move {
            match pending {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PersistCommand::Dirty) => {
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + debounce);
                        }
                    }
                    Some(PersistCommand::Flush(reply)) => {
                        deadline = None;
                        let _ = reply.send(write_snapshot(&db, &store).await);
                    }
                    Some(PersistCommand::Shutdown) | None => {
                        if deadline.is_some() {
                            if let Err(e) = write_snapshot(&db, &store).await {
                                warn!(error = %e, "final snapshot write failed");
                            }
                        }
                        break;
                    }
                }
            }

            _ = timer => {
                deadline = None;
                if let Err(e) = write_snapshot(&db, &store).await {
                    warn!(error = %e, "snapshot write failed");
                }
            }
        }
    }

    info!("persister terminated");
}

async fn write_snapshot(db: &DatabaseHandle, store: &StoreHandle) -> Result<()> {
    let snapshot = store.read(|s| s.to_snapshot())?;
    let db = db.clone();
    tokio::task::spawn_blocking(move || db.with(|db| db.save_snapshot(&snapshot))).await?
}
