//! Coalesces bursts of local changes into a single upload.
//!
//! Every change event restarts the window. When it elapses without another
//! event, one upload of the then-current state runs. Events arriving while that
//! upload is in flight are dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine::SyncEngine;
use crate::local::LocalStateStore;
use crate::remote::RemoteDocumentStore;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(2500);

/// Background task driving automatic uploads. Dropping it stops the task.
///
/// Stopping never aborts an upload that already started; only the pending
/// window is discarded.
#[derive(Debug)]
pub struct ChangeDebouncer {
    task: JoinHandle<()>,
}

impl ChangeDebouncer {
    /// Start listening for changes, or `None` when automatic sync is not
    /// active. The task ends by itself once sync is deactivated.
    pub fn spawn<R, S>(engine: Arc<SyncEngine<R, S>>, window: Duration) -> Option<Self>
    where
        R: RemoteDocumentStore + 'static,
        S: LocalStateStore + 'static,
    {
        let mut active = engine.subscribe_active();
        if !*active.borrow_and_update() {
            tracing::debug!("Auto-upload listener not started: sync inactive");
            return None;
        }

        let mut changes = engine.document().subscribe();
        let in_flight = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                tokio::select! {
                    event = changes.recv() => match event {
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            if in_flight.load(Ordering::Acquire) {
                                tracing::debug!("Change ignored: upload in flight");
                                continue;
                            }
                            deadline = Some(Instant::now() + window);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        deadline = None;
                        start_upload(Arc::clone(&engine), Arc::clone(&in_flight));
                    }
                    changed = active.changed() => {
                        if changed.is_err() || !*active.borrow_and_update() {
                            tracing::debug!("Auto-upload listener stopped: sync deactivated");
                            break;
                        }
                    }
                }
            }
        });

        Some(Self { task })
    }

    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ChangeDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn start_upload<R, S>(engine: Arc<SyncEngine<R, S>>, in_flight: Arc<AtomicBool>)
where
    R: RemoteDocumentStore + 'static,
    S: LocalStateStore + 'static,
{
    in_flight.store(true, Ordering::Release);
    tokio::spawn(async move {
        let outcome = engine.auto_upload().await;
        tracing::debug!("Debounced upload finished: {outcome:?}");
        in_flight.store(false, Ordering::Release);
    });
}
