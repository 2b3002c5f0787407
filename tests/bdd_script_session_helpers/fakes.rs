//! In-memory repository and container doubles for script session scenarios.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use camino::Utf8PathBuf;
use vccpm::error::{ContainerError, VccpmError};
use vccpm::repository::{
    RepositoryFuture, RepositoryManager, RepositoryReference, project_name_from_url,
};
use vccpm::session::{
    BuildContext, ContainerInstance, ContainerRuntime, ContainerRuntimeFactory, RuntimeFuture,
};

/// Shared, ordered record of engine calls.
pub type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(event.into());
}

/// How the fake script behaves once issued.
#[derive(Clone, Debug, Default)]
pub struct ScriptBehaviour {
    /// Text written to stdout on exit.
    pub stdout: String,
    /// Simulated run time.
    pub run_for: Duration,
    /// Fail the container start.
    pub fail_start: bool,
}

/// Repository cache that counts clones and can report a moved remote.
#[derive(Clone, Debug, Default)]
pub struct CountingManager {
    cloned: Arc<AtomicBool>,
    clones: Arc<AtomicUsize>,
    remote_moved: Arc<AtomicBool>,
}

impl CountingManager {
    /// Make the remote head appear moved on every later check.
    pub fn move_remote(&self) {
        self.remote_moved.store(true, Ordering::SeqCst);
    }

    /// Number of clones performed so far.
    #[must_use]
    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    fn reference(url: &str) -> Result<RepositoryReference, VccpmError> {
        let project = project_name_from_url(url)?;
        Ok(RepositoryReference::new(
            url,
            Utf8PathBuf::from("/cache").join(project),
        ))
    }
}

impl RepositoryManager for CountingManager {
    fn is_cloned_locally(&self, _url: &str) -> RepositoryFuture<'_, bool> {
        Box::pin(async move { Ok(self.cloned.load(Ordering::SeqCst)) })
    }

    fn clone_repository(&self, url: &str) -> RepositoryFuture<'_, RepositoryReference> {
        let reference = Self::reference(url);
        Box::pin(async move {
            self.clones.fetch_add(1, Ordering::SeqCst);
            self.cloned.store(true, Ordering::SeqCst);
            reference
        })
    }

    fn existing_repository(&self, url: &str) -> RepositoryFuture<'_, RepositoryReference> {
        let reference = Self::reference(url);
        Box::pin(async move { reference })
    }

    fn is_remote_different(&self, _url: &str) -> RepositoryFuture<'_, bool> {
        Box::pin(async move { Ok(self.remote_moved.load(Ordering::SeqCst)) })
    }
}

fn failure(container_id: &str, step: &str) -> VccpmError {
    VccpmError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: format!("{step} failed"),
    })
}

/// Container that sleeps for the configured run time, then captures stdout.
#[derive(Debug)]
pub struct ScriptedInstance {
    name: String,
    behaviour: ScriptBehaviour,
    events: Events,
    captured: OnceLock<Vec<u8>>,
}

impl ContainerInstance for ScriptedInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute_command<'a>(&'a self, command: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            record(&self.events, format!("execute {command}"));
            Ok(())
        })
    }

    fn wait(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            tokio::time::sleep(self.behaviour.run_for).await;
            drop(self.captured.set(self.behaviour.stdout.clone().into_bytes()));
            Ok(())
        })
    }

    fn stdout(&self) -> Option<Vec<u8>> {
        self.captured.get().cloned()
    }

    fn stop(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            record(&self.events, "stop");
            Ok(())
        })
    }

    fn remove(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            record(&self.events, "remove");
            Ok(())
        })
    }
}

/// Runtime that records its build context and image release.
#[derive(Debug)]
pub struct ScriptedRuntime {
    context: BuildContext,
    behaviour: ScriptBehaviour,
    events: Events,
}

impl ContainerRuntime for ScriptedRuntime {
    type Instance = ScriptedInstance;

    fn start<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, Self::Instance> {
        Box::pin(async move {
            record(
                &self.events,
                format!("start {name} from {}", self.context.path()),
            );
            if self.behaviour.fail_start {
                return Err(failure(name, "start"));
            }
            Ok(ScriptedInstance {
                name: String::from(name),
                behaviour: self.behaviour.clone(),
                events: Arc::clone(&self.events),
                captured: OnceLock::new(),
            })
        })
    }

    fn dispose(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            record(&self.events, "release image");
            Ok(())
        })
    }
}

/// Factory producing [`ScriptedRuntime`]s that share one event log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedFactory {
    /// Behaviour given to every container.
    pub behaviour: ScriptBehaviour,
    /// Engine calls made by every runtime.
    pub events: Events,
}

impl ContainerRuntimeFactory for ScriptedFactory {
    type Runtime = ScriptedRuntime;

    fn create(&self, context: BuildContext) -> Self::Runtime {
        ScriptedRuntime {
            context,
            behaviour: self.behaviour.clone(),
            events: Arc::clone(&self.events),
        }
    }
}
