//! In-memory runtime doubles shared by the session tests.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use super::launcher::{
    BuildContext, ContainerInstance, ContainerRuntime, ContainerRuntimeFactory, RuntimeFuture,
};
use crate::error::{ContainerError, VccpmError};

/// Ordered record of engine calls made by the fakes.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|seen| *seen == event).count()
    }
}

/// Behaviour knobs for a fake container.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBehaviour {
    pub(crate) run_for: Duration,
    pub(crate) stdout: Vec<u8>,
    pub(crate) fail_start: bool,
    pub(crate) fail_execute: bool,
    pub(crate) fail_wait: bool,
    pub(crate) fail_stop: bool,
    pub(crate) fail_dispose: bool,
}

impl FakeBehaviour {
    pub(crate) fn printing(stdout: &str, run_for: Duration) -> Self {
        Self {
            run_for,
            stdout: stdout.as_bytes().to_vec(),
            ..Self::default()
        }
    }
}

fn failure(container_id: &str, step: &str) -> VccpmError {
    VccpmError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: format!("{step} failed"),
    })
}

#[derive(Debug)]
pub(crate) struct FakeInstance {
    name: String,
    behaviour: FakeBehaviour,
    log: EventLog,
    captured: OnceLock<Vec<u8>>,
}

impl FakeInstance {
    pub(crate) fn new(name: &str, behaviour: FakeBehaviour, log: EventLog) -> Self {
        Self {
            name: String::from(name),
            behaviour,
            log,
            captured: OnceLock::new(),
        }
    }
}

impl ContainerInstance for FakeInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute_command<'a>(&'a self, command: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            self.log.push(format!("execute {command}"));
            if self.behaviour.fail_execute {
                return Err(failure(&self.name, "execute"));
            }
            Ok(())
        })
    }

    fn wait(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            tokio::time::sleep(self.behaviour.run_for).await;
            if self.behaviour.fail_wait {
                return Err(failure(&self.name, "wait"));
            }
            drop(self.captured.set(self.behaviour.stdout.clone()));
            Ok(())
        })
    }

    fn stdout(&self) -> Option<Vec<u8>> {
        self.captured.get().cloned()
    }

    fn stop(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            self.log.push("stop");
            if self.behaviour.fail_stop {
                return Err(failure(&self.name, "stop"));
            }
            Ok(())
        })
    }

    fn remove(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            self.log.push("remove");
            Ok(())
        })
    }
}

#[derive(Debug)]
pub(crate) struct FakeRuntime {
    context: BuildContext,
    behaviour: FakeBehaviour,
    log: EventLog,
}

impl ContainerRuntime for FakeRuntime {
    type Instance = FakeInstance;

    fn start<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, Self::Instance> {
        Box::pin(async move {
            self.log.push(format!(
                "start {name} from {} socket={}",
                self.context.path(),
                self.context.socket_access()
            ));
            if self.behaviour.fail_start {
                return Err(failure(name, "start"));
            }
            Ok(FakeInstance::new(
                name,
                self.behaviour.clone(),
                self.log.clone(),
            ))
        })
    }

    fn dispose(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            self.log.push("dispose runtime");
            if self.behaviour.fail_dispose {
                return Err(failure("runtime", "dispose"));
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFactory {
    pub(crate) behaviour: FakeBehaviour,
    pub(crate) log: EventLog,
}

impl FakeFactory {
    pub(crate) fn new(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour,
            log: EventLog::default(),
        }
    }
}

impl ContainerRuntimeFactory for FakeFactory {
    type Runtime = FakeRuntime;

    fn create(&self, context: BuildContext) -> Self::Runtime {
        FakeRuntime {
            context,
            behaviour: self.behaviour.clone(),
            log: self.log.clone(),
        }
    }
}
