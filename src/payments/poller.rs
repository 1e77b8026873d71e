//! Transaction status polling against a hard deadline
//!
//! A watch is a single future that owns both of its timers: the periodic
//! store check and the overall deadline. Dropping the future tears both
//! down together, so an abandoned watch leaves nothing ticking.

use crate::database::payment_store::{TransactionStatus, TransactionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Terminal result of watching one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    Timeout,
}

impl PollOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollOutcome::Completed => "completed",
            PollOutcome::Failed => "failed",
            PollOutcome::Timeout => "timeout",
        }
    }

    fn from_status(status: TransactionStatus) -> Option<Self> {
        match status {
            TransactionStatus::Completed => Some(PollOutcome::Completed),
            TransactionStatus::Failed => Some(PollOutcome::Failed),
            TransactionStatus::Pending => None,
        }
    }
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watches pending transactions until they resolve or a deadline passes.
#[derive(Clone)]
pub struct StatusPoller {
    store: Arc<dyn TransactionStore>,
    check_interval: Duration,
    deadline: Duration,
}

impl StatusPoller {
    pub fn new(store: Arc<dyn TransactionStore>, check_interval: Duration, deadline: Duration) -> Self {
        Self {
            store,
            check_interval,
            deadline,
        }
    }

    /// Poll the store until the transaction reaches a terminal status or the
    /// deadline expires, resolving exactly once.
    ///
    /// The first check fires immediately, so a watch started right after
    /// initiation observes the pending row on its first look. A check that
    /// lands on the deadline instant runs before the deadline is consulted,
    /// so a row resolved at the last moment still reports its real outcome.
    /// Store errors on individual checks are logged and retried on the next
    /// tick.
    pub async fn watch(&self, transaction_id: &str) -> PollOutcome {
        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        let mut checks = tokio::time::interval(self.check_interval);
        checks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            transaction_id,
            interval_secs = self.check_interval.as_secs(),
            deadline_secs = self.deadline.as_secs(),
            "Watching transaction"
        );

        loop {
            tokio::select! {
                biased;

                _ = checks.tick() => {
                    match self.store.get(transaction_id).await {
                        Ok(row) => {
                            if let Some(outcome) = PollOutcome::from_status(row.status) {
                                info!(transaction_id, outcome = outcome.as_str(), "Watch resolved");
                                return outcome;
                            }
                        }
                        Err(e) => {
                            warn!(transaction_id, error = %e, "Status check failed, retrying next tick");
                        }
                    }
                }
                _ = &mut deadline => {
                    info!(transaction_id, outcome = "timeout", "Watch deadline reached");
                    return PollOutcome::Timeout;
                }
            }
        }
    }

    /// Run a watch on a background task, returning a guard that resolves at
    /// most once. Dropping or cancelling the guard aborts the task.
    pub fn spawn_watch(&self, transaction_id: impl Into<String>) -> WatchGuard {
        let poller = self.clone();
        let transaction_id = transaction_id.into();
        let (sender, receiver) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let outcome = poller.watch(&transaction_id).await;
            let _ = sender.send(outcome);
        });

        WatchGuard {
            receiver: Some(receiver),
            handle,
        }
    }
}

/// Handle to a detached watch. The outcome is delivered at most once;
/// dropping the guard cancels the watch and both of its timers.
pub struct WatchGuard {
    receiver: Option<oneshot::Receiver<PollOutcome>>,
    handle: JoinHandle<()>,
}

impl WatchGuard {
    /// Wait for the watch to resolve. `None` if it was cancelled first or
    /// the outcome was already delivered to an earlier call.
    pub async fn outcome(&mut self) -> Option<PollOutcome> {
        match self.receiver.take() {
            Some(receiver) => receiver.await.ok(),
            None => None,
        }
    }

    pub fn cancel(&mut self) {
        self.handle.abort();
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
