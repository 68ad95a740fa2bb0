//! Sync status exposed to the calling layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::util::unix_millis_now;
use crate::{Error, Result};

/// Outcome of the most recent sync attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
    Conflict,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Conflict => "conflict",
        }
    }

    /// Whether `self -> next` is a legal step.
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Syncing, Self::Syncing) => false,
            (_, Self::Syncing) => true,
            (Self::Syncing, Self::Idle | Self::Success | Self::Error | Self::Conflict) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Point-in-time view published to observers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: SyncStatus,
    pub message: Option<String>,
    /// Unix ms of the last `success`.
    pub last_sync_time: Option<i64>,
}

impl StatusSnapshot {
    /// A conflict can be resolved by a forced pull of the remote document.
    pub fn pull_available(&self) -> bool {
        self.status == SyncStatus::Conflict
    }
}

/// `idle -> syncing -> {idle, success, error, conflict}`, then back to
/// `syncing` on the next attempt.
#[derive(Debug)]
pub struct SyncStatusMachine {
    sender: watch::Sender<StatusSnapshot>,
}

impl SyncStatusMachine {
    pub fn new(initial: StatusSnapshot) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn current(&self) -> StatusSnapshot {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.sender.subscribe()
    }

    pub fn begin(&self) -> Result<()> {
        self.transition(SyncStatus::Syncing, None)
    }

    pub fn settle_idle(&self) -> Result<()> {
        self.transition(SyncStatus::Idle, None)
    }

    pub fn succeed(&self) -> Result<()> {
        self.transition(SyncStatus::Success, None)
    }

    pub fn fail(&self, message: impl Into<String>) -> Result<()> {
        self.transition(SyncStatus::Error, Some(message.into()))
    }

    pub fn conflict(&self, message: impl Into<String>) -> Result<()> {
        self.transition(SyncStatus::Conflict, Some(message.into()))
    }

    fn transition(&self, next: SyncStatus, message: Option<String>) -> Result<()> {
        let from = self.sender.borrow().status;
        if !from.can_transition_to(next) {
            return Err(Error::InvalidTransition { from, to: next });
        }

        self.sender.send_modify(|snapshot| {
            snapshot.status = next;
            snapshot.message = message;
            if next == SyncStatus::Success {
                snapshot.last_sync_time = Some(unix_millis_now());
            }
        });
        tracing::debug!("Sync status {from} -> {next}");
        Ok(())
    }
}

impl Default for SyncStatusMachine {
    fn default() -> Self {
        Self::new(StatusSnapshot::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_moves_through_syncing() {
        let machine = SyncStatusMachine::default();
        machine.begin().unwrap();
        assert_eq!(machine.current().status, SyncStatus::Syncing);

        machine.succeed().unwrap();
        let snapshot = machine.current();
        assert_eq!(snapshot.status, SyncStatus::Success);
        assert!(snapshot.last_sync_time.is_some());
        assert_eq!(snapshot.message, None);
    }

    #[test]
    fn terminal_states_require_syncing_first() {
        let machine = SyncStatusMachine::default();
        let error = machine.succeed().unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidTransition {
                from: SyncStatus::Idle,
                to: SyncStatus::Success
            }
        ));
    }

    #[test]
    fn overlapping_attempts_are_rejected() {
        let machine = SyncStatusMachine::default();
        machine.begin().unwrap();
        assert!(machine.begin().is_err());
    }

    #[test]
    fn conflict_offers_pull_and_keeps_message() {
        let machine = SyncStatusMachine::default();
        machine.begin().unwrap();
        machine.conflict("remote is newer").unwrap();

        let snapshot = machine.current();
        assert!(snapshot.pull_available());
        assert_eq!(snapshot.message.as_deref(), Some("remote is newer"));

        machine.begin().unwrap();
        machine.succeed().unwrap();
        assert!(!machine.current().pull_available());
    }

    #[test]
    fn failure_keeps_previous_sync_time() {
        let machine = SyncStatusMachine::default();
        machine.begin().unwrap();
        machine.succeed().unwrap();
        let synced_at = machine.current().last_sync_time;

        machine.begin().unwrap();
        machine.fail("network error").unwrap();
        assert_eq!(machine.current().last_sync_time, synced_at);
    }

    #[tokio::test]
    async fn observers_see_transitions() {
        let machine = SyncStatusMachine::default();
        let mut receiver = machine.subscribe();

        machine.begin().unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().status, SyncStatus::Syncing);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::Conflict).unwrap(),
            "\"conflict\""
        );
    }
}
