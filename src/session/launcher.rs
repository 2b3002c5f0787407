//! Container runtime seams and the launch step.
//!
//! A [`ContainerRuntimeFactory`] turns a build context into a
//! [`ContainerRuntime`], which owns the image build resources and starts one
//! [`ContainerInstance`]. The Docker-backed implementation lives in
//! `crate::engine`.

use std::future::Future;
use std::pin::Pin;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::VccpmError;

/// Boxed future type returned by runtime and instance operations.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VccpmError>> + Send + 'a>>;

/// Directory holding the image definition, plus the socket access grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    path: Utf8PathBuf,
    socket_access: bool,
}

impl BuildContext {
    /// Describe a build from `path`, optionally granting engine socket access.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, socket_access: bool) -> Self {
        Self {
            path: path.into(),
            socket_access,
        }
    }

    /// Return the build context directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Return whether the container may control the host engine.
    #[must_use]
    pub const fn socket_access(&self) -> bool {
        self.socket_access
    }
}

/// Creates container runtimes for build contexts.
pub trait ContainerRuntimeFactory: Send + Sync {
    /// Runtime type produced by this factory.
    type Runtime: ContainerRuntime;

    /// Create a runtime for `context`. No engine work happens yet.
    fn create(&self, context: BuildContext) -> Self::Runtime;
}

/// Owns build resources for one container.
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Running container type.
    type Instance: ContainerInstance;

    /// Build the image and start a container called `name`.
    fn start<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, Self::Instance>;

    /// Release build resources such as the image.
    fn dispose(&self) -> RuntimeFuture<'_, ()>;
}

/// A running container that executes one command.
pub trait ContainerInstance: Send + Sync + 'static {
    /// Return the container name.
    fn name(&self) -> &str;

    /// Issue `command` inside the container without waiting for it.
    fn execute_command<'a>(&'a self, command: &'a str) -> RuntimeFuture<'a, ()>;

    /// Wait for the issued command to exit, capturing its stdout.
    fn wait(&self) -> RuntimeFuture<'_, ()>;

    /// Return captured stdout, or `None` before the command has finished.
    fn stdout(&self) -> Option<Vec<u8>>;

    /// Stop the container.
    fn stop(&self) -> RuntimeFuture<'_, ()>;

    /// Remove the container.
    fn remove(&self) -> RuntimeFuture<'_, ()>;
}

/// Builds and starts the container for a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerLauncher;

impl ContainerLauncher {
    /// Create a runtime for `context` and start a container called `name`.
    ///
    /// When the start fails the runtime is disposed before the error returns.
    ///
    /// # Errors
    ///
    /// Returns the `ContainerError` raised while building or starting.
    pub async fn launch<F: ContainerRuntimeFactory>(
        factory: &F,
        context: BuildContext,
        name: &str,
    ) -> Result<(F::Runtime, <F::Runtime as ContainerRuntime>::Instance), VccpmError> {
        tracing::info!(
            container = name,
            context = %context.path(),
            socket_access = context.socket_access(),
            "launching container"
        );
        let runtime = factory.create(context);

        match runtime.start(name).await {
            Ok(instance) => Ok((runtime, instance)),
            Err(error) => {
                if let Err(dispose_error) = runtime.dispose().await {
                    tracing::warn!(container = name, error = %dispose_error, "runtime disposal after failed start failed");
                }
                Err(error)
            }
        }
    }
}
