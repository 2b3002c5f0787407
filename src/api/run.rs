//! Script run orchestration.

use std::sync::Arc;

use futures_util::FutureExt;

use super::ScriptOutcome;
use crate::config::AppConfig;
use crate::engine::{DockerRuntimeFactory, EngineConnector, SocketResolver};
use crate::error::Result as VccpmResult;
use crate::repository::{GitCliRepositoryManager, RepositoryManager};
use crate::session::{ContainerRuntimeFactory, ScriptRequest, ScriptRunner};

/// Parameters for running a script against the configured engine.
pub struct RunParams<'a, E: mockable::Env> {
    /// Application configuration (engine socket, cache, container settings).
    pub config: &'a AppConfig,
    /// The validated script request.
    pub request: &'a ScriptRequest,
    /// Environment variable provider for socket resolution.
    pub env: &'a E,
}

/// Connect to the engine, verify it answers, and run the script.
///
/// # Errors
///
/// Returns `ContainerError::ConnectionFailed` / `SocketNotFound` /
/// `PermissionDenied` / `HealthCheckFailed` / `HealthCheckTimeout` when the
/// engine is unusable, and otherwise the errors of [`execute_script`].
pub async fn run_script<E: mockable::Env>(params: RunParams<'_, E>) -> VccpmResult<ScriptOutcome> {
    let RunParams {
        config,
        request,
        env,
    } = params;

    let resolver = SocketResolver::new(env);
    let docker = EngineConnector::connect_with_fallback_and_verify_async(
        config.engine_socket.as_deref(),
        &resolver,
    )
    .await?;

    let factory = DockerRuntimeFactory::new(Arc::new(docker), config.container.clone());
    let manager = GitCliRepositoryManager::from_config(&config.repository);
    let runner = ScriptRunner::new(manager, factory, &config.container);
    execute_script(&runner, request).await
}

/// Run `request` in a scoped session and return its decoded output.
///
/// # Errors
///
/// Returns `RepositoryError` or `ContainerError` when the session cannot
/// start, `ExecutionError::Timeout` when the deadline elapses, and
/// `ExecutionError::OutputDecode` when the output is not UTF-8.
pub async fn execute_script<M, F>(
    runner: &ScriptRunner<M, F>,
    request: &ScriptRequest,
) -> VccpmResult<ScriptOutcome>
where
    M: RepositoryManager,
    F: ContainerRuntimeFactory,
{
    runner
        .with_session(request, |session| {
            async move {
                session.wait().await?;
                let output = session
                    .output_text()?
                    .map(String::from)
                    .unwrap_or_default();
                Ok(ScriptOutcome { output })
            }
            .boxed()
        })
        .await
}
