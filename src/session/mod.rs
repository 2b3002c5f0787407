//! Script execution sessions.
//!
//! A session couples a running container, the runtime that built it, and the
//! deadline guard watching the in-container command. Sessions are created by
//! [`ScriptRunner`] and must be disposed, either explicitly with
//! [`ExecutionSession::dispose`] or through [`ScriptRunner::with_session`].

mod command;
mod executor;
mod launcher;
mod runner;

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::error::{ExecutionError, VccpmError};

pub use command::build_command_line;
pub use executor::{DeadlineGuard, DeadlineGuardedExecutor, ExecutionOutcome};
pub use launcher::{
    BuildContext, ContainerInstance, ContainerLauncher, ContainerRuntime,
    ContainerRuntimeFactory, RuntimeFuture,
};
pub use runner::{ScriptRequest, ScriptRunner, container_name};

/// Lifecycle state of an [`ExecutionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The command may still be running; no `wait` has settled yet.
    Running,
    /// `wait` observed completion before the deadline.
    Completed,
    /// `wait` observed the deadline first.
    TimedOut,
    /// The worker finished in time but reported an error.
    Failed,
    /// Resources have been released.
    Disposed,
}

/// A running script with its container and deadline.
pub struct ExecutionSession<R: ContainerRuntime> {
    name: String,
    instance: Option<Arc<R::Instance>>,
    runtime: Option<R>,
    guard: DeadlineGuard,
    state: SessionState,
    handle: Handle,
}

impl<R: ContainerRuntime> std::fmt::Debug for ExecutionSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl<R: ContainerRuntime> ExecutionSession<R> {
    pub(crate) fn new(
        name: String,
        instance: Arc<R::Instance>,
        runtime: R,
        guard: DeadlineGuard,
    ) -> Self {
        Self {
            name,
            instance: Some(instance),
            runtime: Some(runtime),
            guard,
            state: SessionState::Running,
            handle: Handle::current(),
        }
    }

    /// Return the container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Return the deadline guard for this run.
    #[must_use]
    pub const fn guard(&self) -> &DeadlineGuard {
        &self.guard
    }

    /// Wait for the script, bounded by the deadline.
    ///
    /// Calling again after a timeout reports the same timeout; calling again
    /// after success succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` when the deadline elapsed first,
    /// `ExecutionError::WorkerFailed` when waiting inside the container
    /// failed, and `ExecutionError::SessionDisposed` after disposal.
    pub async fn wait(&mut self) -> Result<(), VccpmError> {
        if self.state == SessionState::Disposed {
            return Err(VccpmError::from(ExecutionError::SessionDisposed));
        }

        match self.guard.wait().await {
            Ok(_) => {
                self.state = SessionState::Completed;
                Ok(())
            }
            Err(error) => {
                self.state = if matches!(error, ExecutionError::Timeout { .. }) {
                    SessionState::TimedOut
                } else {
                    SessionState::Failed
                };
                if self.state == SessionState::TimedOut {
                    tracing::warn!(container = %self.name, %error, "script deadline elapsed");
                }
                Err(VccpmError::from(error))
            }
        }
    }

    /// Return the settled outcome once `wait` has reached a verdict.
    #[must_use]
    pub fn outcome(&self) -> Option<&ExecutionOutcome> {
        self.guard.outcome()
    }

    /// Return captured stdout, or `None` while the worker has not produced it.
    #[must_use]
    pub fn output(&self) -> Option<&[u8]> {
        self.guard.output()
    }

    /// Return captured stdout decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::OutputDecode` when the bytes are not UTF-8.
    pub fn output_text(&self) -> Result<Option<&str>, VccpmError> {
        self.output()
            .map(std::str::from_utf8)
            .transpose()
            .map_err(|error| {
                VccpmError::from(ExecutionError::OutputDecode {
                    message: error.to_string(),
                })
            })
    }

    /// Cancel the worker, stop and remove the container, and release the
    /// runtime. A second call does nothing and succeeds.
    ///
    /// Every step is attempted; the first failure is returned and later ones
    /// are logged.
    ///
    /// # Errors
    ///
    /// Returns the first `ContainerError` raised during teardown.
    pub async fn dispose(&mut self) -> Result<(), VccpmError> {
        if self.state == SessionState::Disposed {
            return Ok(());
        }

        self.state = SessionState::Disposed;
        self.guard.cancel();
        teardown(&self.name, self.instance.take(), self.runtime.take()).await
    }
}

impl<R: ContainerRuntime> Drop for ExecutionSession<R> {
    fn drop(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }

        self.guard.cancel();
        let instance = self.instance.take();
        let runtime = self.runtime.take();
        let name = std::mem::take(&mut self.name);
        tracing::warn!(container = %name, "session dropped without dispose; tearing down in background");

        drop(self.handle.spawn(async move {
            if let Err(error) = teardown(&name, instance, runtime).await {
                tracing::warn!(container = %name, %error, "background teardown failed");
            }
        }));
    }
}

/// Stop and remove the container, then dispose the runtime.
pub(crate) async fn teardown<R: ContainerRuntime>(
    name: &str,
    instance: Option<Arc<R::Instance>>,
    runtime: Option<R>,
) -> Result<(), VccpmError> {
    let mut first_error: Option<VccpmError> = None;
    let mut record = |step: &str, result: Result<(), VccpmError>| {
        if let Err(error) = result {
            tracing::warn!(container = name, step, %error, "teardown step failed");
            first_error.get_or_insert(error);
        }
    };

    if let Some(running) = instance {
        record("stop", running.stop().await);
        record("remove", running.remove().await);
    }
    if let Some(owned_runtime) = runtime {
        record("dispose runtime", owned_runtime.dispose().await);
    }

    tracing::info!(container = name, "session disposed");
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
pub(crate) mod fakes;
