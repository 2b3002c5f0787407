//! Session start and scoped execution.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::command::build_command_line;
use super::executor::DeadlineGuardedExecutor;
use super::launcher::{BuildContext, ContainerLauncher, ContainerRuntimeFactory};
use super::{ExecutionSession, teardown};
use crate::config::{ContainerConfig, validate_timeout_secs};
use crate::error::{ConfigError, VccpmError};
use crate::repository::{RepositoryManager, RepositoryResolver, project_name_from_url};

/// A validated request to run one script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    url: String,
    script: String,
    arguments: Vec<String>,
    timeout: Duration,
    timeout_secs: f64,
    socket_access: bool,
}

impl ScriptRequest {
    /// Validate and build a request without arguments or socket access.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for a blank URL or script,
    /// `ConfigError::InvalidValue` for a timeout that is not finite and
    /// positive, and `RepositoryError::InvalidUrl` when the URL yields no
    /// project name.
    pub fn new(
        url: impl Into<String>,
        script: impl Into<String>,
        timeout_secs: f64,
    ) -> Result<Self, VccpmError> {
        let clone_url = url.into();
        let script_path = script.into();

        for (field, value) in [("url", &clone_url), ("script", &script_path)] {
            if value.trim().is_empty() {
                return Err(VccpmError::from(ConfigError::MissingRequired {
                    field: String::from(field),
                }));
            }
        }
        project_name_from_url(&clone_url)?;
        validate_timeout_secs("timeout", timeout_secs)?;
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|error| {
            VccpmError::from(ConfigError::InvalidValue {
                field: String::from("timeout"),
                reason: error.to_string(),
            })
        })?;

        Ok(Self {
            url: clone_url,
            script: script_path,
            arguments: Vec::new(),
            timeout,
            timeout_secs,
            socket_access: false,
        })
    }

    /// Pass `arguments` to the script, joined with single spaces.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Grant or deny the container access to the host engine socket.
    #[must_use]
    pub const fn with_socket_access(mut self, socket_access: bool) -> Self {
        self.socket_access = socket_access;
        self
    }

    /// Return the clone URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the script path inside the container.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Return the script arguments.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Return the deadline as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return the deadline in seconds as requested.
    #[must_use]
    pub const fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }

    /// Return whether the container may control the host engine.
    #[must_use]
    pub const fn socket_access(&self) -> bool {
        self.socket_access
    }
}

/// Derive the container name for `url`: `<prefix>_<project>`, lower-cased.
///
/// # Errors
///
/// Returns `RepositoryError::InvalidUrl` when the URL yields no project name.
pub fn container_name(prefix: &str, url: &str) -> Result<String, VccpmError> {
    let project = project_name_from_url(url)?;
    Ok(format!("{prefix}_{}", project.to_lowercase()))
}

/// Starts script sessions against a repository cache and a container runtime.
#[derive(Debug)]
pub struct ScriptRunner<M, F> {
    resolver: RepositoryResolver<M>,
    factory: F,
    name_prefix: String,
    interpreter: String,
}

impl<M, F> ScriptRunner<M, F>
where
    M: RepositoryManager,
    F: ContainerRuntimeFactory,
{
    /// Create a runner using the naming and interpreter from `config`.
    #[must_use]
    pub fn new(manager: M, factory: F, config: &ContainerConfig) -> Self {
        Self {
            resolver: RepositoryResolver::new(manager),
            factory,
            name_prefix: config.name_prefix.clone(),
            interpreter: config.interpreter.clone(),
        }
    }

    /// Return the repository resolver.
    #[must_use]
    pub const fn resolver(&self) -> &RepositoryResolver<M> {
        &self.resolver
    }

    /// Resolve the repository, start its container, issue the script, and
    /// start the deadline.
    ///
    /// The returned session must be disposed. When any step after the
    /// container starts fails, the container is torn down before the error
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` when the repository is unavailable and a
    /// `ContainerError` when the container cannot be built, started, or given
    /// the command.
    pub async fn run_python_script(
        &self,
        request: &ScriptRequest,
    ) -> Result<ExecutionSession<F::Runtime>, VccpmError> {
        let repository = self.resolver.resolve(request.url()).await?;
        let name = container_name(&self.name_prefix, request.url())?;
        let command = build_command_line(&self.interpreter, request.script(), request.arguments());
        let context = BuildContext::new(repository.path(), request.socket_access());

        let (runtime, instance) = ContainerLauncher::launch(&self.factory, context, &name).await?;
        let shared = Arc::new(instance);

        match DeadlineGuardedExecutor::start(
            Arc::clone(&shared),
            &command,
            request.timeout(),
            request.timeout_secs(),
        )
        .await
        {
            Ok(guard) => Ok(ExecutionSession::new(name, shared, runtime, guard)),
            Err(error) => {
                if let Err(teardown_error) =
                    teardown::<F::Runtime>(&name, Some(shared), Some(runtime)).await
                {
                    tracing::warn!(container = %name, error = %teardown_error, "teardown after failed command issue failed");
                }
                Err(error)
            }
        }
    }

    /// Run `body` against a fresh session and dispose it afterwards.
    ///
    /// Disposal happens whether `body` succeeds, fails, or panics; a panic is
    /// resumed once the session is torn down. When both `body` and disposal
    /// fail, the body's error is returned and the disposal error is logged.
    ///
    /// # Errors
    ///
    /// Returns the session start error, the body's error, or the disposal
    /// error, in that order of precedence.
    pub async fn with_session<T, B>(&self, request: &ScriptRequest, body: B) -> Result<T, VccpmError>
    where
        B: for<'s> FnOnce(&'s mut ExecutionSession<F::Runtime>) -> BoxFuture<'s, Result<T, VccpmError>>,
    {
        let mut session = self.run_python_script(request).await?;
        let outcome = AssertUnwindSafe(async { body(&mut session).await })
            .catch_unwind()
            .await;
        let disposed = session.dispose().await;

        match outcome {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(Err(error)) => {
                if let Err(dispose_error) = disposed {
                    tracing::warn!(container = session.name(), error = %dispose_error, "disposal after failed body failed");
                }
                Err(error)
            }
            Ok(Ok(value)) => disposed.map(|()| value),
        }
    }
}
