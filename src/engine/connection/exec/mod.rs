//! Attached command execution with stdout capture.
//!
//! This module wraps Bollard exec APIs behind a small trait seam so command
//! execution behaviour can be unit-tested without a live daemon. Starting an
//! exec and collecting its output are separate steps: the command is issued
//! on the caller's task, while draining the stream and waiting for the exit
//! code may happen later on another task.

mod capture;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::{Docker, errors::Error as BollardError};
use futures_util::Stream;

use self::capture::{drain_output_async, wait_for_exit_code_async};
use super::EngineConnector;
use crate::error::{ConfigError, ContainerError, VccpmError};

pub(super) const EXEC_INSPECT_POLL_INTERVAL_MS: u64 = 100;

/// Multiplexed output stream of an attached exec session.
pub type ExecOutputStream = Pin<Box<dyn Stream<Item = Result<LogOutput, BollardError>> + Send>>;

/// Boxed future type returned by [`ContainerExecClient::create_exec`].
pub type CreateExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CreateExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::start_exec`].
pub type StartExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StartExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::inspect_exec`].
pub type InspectExecFuture<'a> = Pin<
    Box<
        dyn Future<Output = Result<bollard::models::ExecInspectResponse, BollardError>> + Send + 'a,
    >,
>;

/// Behaviour required to run and inspect exec sessions.
pub trait ContainerExecClient {
    /// Create an exec session in a running container.
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_>;

    /// Start a previously created exec session.
    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;

    /// Inspect an exec session for running status and exit code.
    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
}

impl ContainerExecClient for Docker {
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::create_exec(self, &container_id_owned, options).await })
    }

    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::start_exec(self, &exec_id_owned, options).await })
    }

    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::inspect_exec(self, &exec_id_owned).await })
    }
}

/// Parameters required to run a command in a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    container_id: String,
    command: Vec<String>,
}

impl ExecRequest {
    /// Create a request that runs `command_line` through `sh -c`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `container_id` or
    /// `command_line` is blank.
    pub fn shell(
        container_id: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Result<Self, VccpmError> {
        let container_id_value = container_id.into();
        let command_value = command_line.into();
        let id = String::from(validate_required_field("container", &container_id_value)?);
        validate_required_field("command", &command_value)?;

        Ok(Self {
            container_id: id,
            command: vec![String::from("sh"), String::from("-c"), command_value],
        })
    }

    /// Return target container identifier.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Return command argv entries.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

/// A started exec session whose output has not been collected yet.
pub struct AttachedExec {
    container_id: String,
    exec_id: String,
    output: ExecOutputStream,
}

impl fmt::Debug for AttachedExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedExec")
            .field("container_id", &self.container_id)
            .field("exec_id", &self.exec_id)
            .finish_non_exhaustive()
    }
}

impl AttachedExec {
    /// Return daemon-assigned exec identifier.
    #[must_use]
    pub fn exec_id(&self) -> &str {
        &self.exec_id
    }
}

/// Captured result of a finished exec session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    exit_code: i64,
    stdout: Vec<u8>,
}

impl ExecOutput {
    /// Return the command's exit code.
    #[must_use]
    pub const fn exit_code(&self) -> i64 {
        self.exit_code
    }

    /// Return the captured stdout bytes.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Consume the output and return the captured stdout bytes.
    #[must_use]
    pub fn into_stdout(self) -> Vec<u8> {
        self.stdout
    }
}

impl EngineConnector {
    /// Create and start an attached exec session.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when the engine rejects the exec
    /// or starts it detached.
    pub async fn start_attached_exec_async<C: ContainerExecClient>(
        client: &C,
        request: &ExecRequest,
    ) -> Result<AttachedExec, VccpmError> {
        let create_result = client
            .create_exec(request.container_id(), build_create_exec_options(request))
            .await
            .map_err(|error| {
                exec_failed(
                    request.container_id(),
                    format!("create exec failed: {error}"),
                )
            })?;

        let exec_id = create_result.id;
        let start_result = client
            .start_exec(&exec_id, Some(build_start_exec_options()))
            .await
            .map_err(|error| {
                exec_failed(
                    request.container_id(),
                    format!("start exec failed: {error}"),
                )
            })?;

        match start_result {
            StartExecResults::Attached { output, .. } => Ok(AttachedExec {
                container_id: String::from(request.container_id()),
                exec_id,
                output,
            }),
            StartExecResults::Detached => Err(exec_failed(
                request.container_id(),
                "daemon returned detached start result for attached exec",
            )),
        }
    }

    /// Drain an attached exec's stdout and wait for its exit code.
    ///
    /// Stderr chunks are logged at debug level and discarded.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when the stream or the inspect
    /// call fails.
    pub async fn collect_exec_output_async<C: ContainerExecClient>(
        client: &C,
        exec: AttachedExec,
    ) -> Result<ExecOutput, VccpmError> {
        let AttachedExec {
            container_id,
            exec_id,
            output,
        } = exec;

        let stdout = drain_output_async(&container_id, output).await?;
        let exit_code = wait_for_exit_code_async(client, &container_id, &exec_id).await?;
        tracing::debug!(%container_id, %exec_id, exit_code, "exec finished");

        Ok(ExecOutput { exit_code, stdout })
    }
}

fn build_create_exec_options(request: &ExecRequest) -> CreateExecOptions<String> {
    CreateExecOptions::<String> {
        attach_stdin: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        cmd: Some(request.command().to_vec()),
        ..CreateExecOptions::default()
    }
}

const fn build_start_exec_options() -> StartExecOptions {
    StartExecOptions {
        detach: false,
        tty: false,
        output_capacity: None,
    }
}

fn validate_required_field<'a>(field: &str, value: &'a str) -> Result<&'a str, VccpmError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(VccpmError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }

    Ok(trimmed)
}

pub(super) fn exec_failed(container_id: &str, message: impl Into<String>) -> VccpmError {
    VccpmError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: message.into(),
    })
}
