//! Deadline-guarded execution of the in-container command.
//!
//! The command is issued on the caller's task. Waiting for it and reading its
//! output then happen on a spawned worker that records a `Completion` in a
//! single-assignment `ResultCell`. The deadline is fixed when the worker
//! starts and is never extended; reaching it does not cancel the worker.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;

use super::launcher::ContainerInstance;
use crate::error::{ExecutionError, VccpmError};

const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// What the worker observed, stamped with the instant it finished.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Completion {
    finished_at: Instant,
    outcome: Result<Option<Vec<u8>>, ExecutionError>,
}

/// Write-once slot shared between the worker and the waiting caller.
#[derive(Debug, Default)]
pub(crate) struct ResultCell {
    slot: OnceLock<Completion>,
    notify: Notify,
}

impl ResultCell {
    /// Record `completion`. Later calls are ignored.
    pub(crate) fn complete(&self, completion: Completion) {
        if self.slot.set(completion).is_ok() {
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn get(&self) -> Option<&Completion> {
        self.slot.get()
    }

    /// Wait until a completion is recorded or `deadline` passes.
    async fn wait_until(&self, deadline: Instant) -> Option<&Completion> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(completion) = self.slot.get() {
                return Some(completion);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.slot.get();
            }
        }
    }
}

/// Settled result of a run, fixed by the first `wait` that reaches a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    output: Option<Vec<u8>>,
    completed_before_deadline: bool,
}

impl ExecutionOutcome {
    /// Return the stdout captured when the verdict was reached.
    #[must_use]
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    /// Report whether the command finished successfully before the deadline.
    #[must_use]
    pub const fn completed_before_deadline(&self) -> bool {
        self.completed_before_deadline
    }
}

/// Handle on a running worker and its deadline.
#[derive(Debug)]
pub struct DeadlineGuard {
    deadline: Instant,
    timeout_secs: f64,
    cell: Arc<ResultCell>,
    settled: OnceLock<ExecutionOutcome>,
    cancel: Option<oneshot::Sender<()>>,
}

impl DeadlineGuard {
    /// Return the instant after which the run counts as timed out.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Block until the worker finishes or the deadline elapses.
    ///
    /// A completion recorded at or after the deadline still reports a
    /// timeout, so repeated calls always agree. The first call fixes the
    /// [`ExecutionOutcome`]; later calls return the same value.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` when the deadline won, or the
    /// worker's own error when it finished in time but failed.
    pub async fn wait(&self) -> Result<ExecutionOutcome, ExecutionError> {
        let completion = self.cell.wait_until(self.deadline).await;
        let verdict = match completion {
            Some(done) if done.finished_at < self.deadline => done.outcome.clone(),
            _ => Err(ExecutionError::Timeout {
                seconds: self.timeout_secs,
            }),
        };

        let outcome = self.settled.get_or_init(|| ExecutionOutcome {
            output: completion
                .and_then(|done| done.outcome.as_ref().ok())
                .and_then(Clone::clone),
            completed_before_deadline: verdict.is_ok(),
        });
        verdict.map(|_| outcome.clone())
    }

    /// Return the settled outcome once a `wait` has reached a verdict.
    #[must_use]
    pub fn outcome(&self) -> Option<&ExecutionOutcome> {
        self.settled.get()
    }

    /// Return captured stdout once the worker has recorded it.
    #[must_use]
    pub fn output(&self) -> Option<&[u8]> {
        self.cell
            .get()
            .and_then(|completion| completion.outcome.as_ref().ok())
            .and_then(Option::as_deref)
    }

    /// Ask the worker to stop waiting. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(sender) = self.cancel.take() {
            // The worker may already have finished and dropped its receiver.
            drop(sender.send(()));
        }
    }

    /// Report whether a cancellation has been requested.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

/// Issues commands and guards their completion with a deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineGuardedExecutor;

impl DeadlineGuardedExecutor {
    /// Issue `command` in `instance`, then start the worker and the deadline.
    ///
    /// # Errors
    ///
    /// Returns the `ContainerError` raised while issuing the command. No
    /// worker is started in that case.
    pub async fn start<I: ContainerInstance>(
        instance: Arc<I>,
        command: &str,
        timeout: Duration,
        timeout_secs: f64,
    ) -> Result<DeadlineGuard, VccpmError> {
        tracing::info!(container = instance.name(), %command, "issuing command");
        instance.execute_command(command).await?;

        let cell = Arc::new(ResultCell::default());
        let (cancel, cancelled) = oneshot::channel();
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or_else(|| far_future(now));
        drop(tokio::spawn(run_worker(instance, Arc::clone(&cell), cancelled)));

        Ok(DeadlineGuard {
            deadline,
            timeout_secs,
            cell,
            settled: OnceLock::new(),
            cancel: Some(cancel),
        })
    }
}

/// Deadline used when the requested timeout does not fit in an `Instant`.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(FAR_FUTURE_SECS)
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "false positive triggered inside tokio::select! expansion"
)]
async fn run_worker<I: ContainerInstance>(
    instance: Arc<I>,
    cell: Arc<ResultCell>,
    cancelled: oneshot::Receiver<()>,
) {
    let outcome = tokio::select! {
        biased;
        _ = cancelled => Err(ExecutionError::Cancelled),
        waited = instance.wait() => waited
            .map(|()| instance.stdout())
            .map_err(|error| ExecutionError::WorkerFailed {
                message: error.to_string(),
            }),
    };

    match &outcome {
        Ok(_) => tracing::info!(container = instance.name(), "script finished"),
        Err(ExecutionError::Cancelled) => {
            tracing::info!(container = instance.name(), "script worker cancelled");
        }
        Err(error) => tracing::warn!(container = instance.name(), %error, "script worker failed"),
    }

    cell.complete(Completion {
        finished_at: Instant::now(),
        outcome,
    });
}
