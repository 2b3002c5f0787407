//! Semantic error types for the vccpm application.
//!
//! This module defines the error hierarchy for vccpm, following the principle of
//! using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect, retry, or map to an exit status, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while resolving a local working copy of a repository.
///
/// Every variant means the repository is unavailable for this run; none are
/// retried internally.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The clone URL does not yield a usable project name.
    #[error("invalid repository URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending clone URL.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },

    /// Cloning the repository failed.
    #[error("failed to clone repository '{url}': {message}")]
    CloneFailed {
        /// The clone URL.
        url: String,
        /// A description of the clone failure.
        message: String,
    },

    /// Querying the remote or local head commit failed.
    #[error("failed to query commit for repository '{url}': {message}")]
    CommitQueryFailed {
        /// The clone URL.
        url: String,
        /// A description of the query failure.
        message: String,
    },

    /// A local working copy was requested but none exists.
    #[error("repository '{url}' is not cloned locally")]
    NotClonedLocally {
        /// The clone URL.
        url: String,
    },
}

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Failed to create a Tokio runtime for a synchronous engine call.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// Failed to build the image from the repository build context.
    #[error("failed to build image '{image}': {message}")]
    ImageBuildFailed {
        /// The image tag being built.
        image: String,
        /// A description of the build failure.
        message: String,
    },

    /// Failed to remove an image.
    #[error("failed to remove image '{image}': {message}")]
    ImageRemoveFailed {
        /// The image tag.
        image: String,
        /// A description of the removal failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container: {message}")]
    CreateFailed {
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Failed to execute a command in a container.
    #[error("failed to execute command in container '{container_id}': {message}")]
    ExecFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the execution failure.
        message: String,
    },

    /// Failed to stop a container.
    #[error("failed to stop container '{container_id}': {message}")]
    StopFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the stop failure.
        message: String,
    },

    /// Failed to remove a container.
    #[error("failed to remove container '{container_id}': {message}")]
    RemoveFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the removal failure.
        message: String,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// Errors surfaced by a running execution session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    /// The deadline elapsed before the in-container command finished.
    #[error("script execution timed out after {seconds} seconds")]
    Timeout {
        /// The configured deadline in seconds.
        seconds: f64,
    },

    /// Captured output is not valid UTF-8.
    #[error("failed to decode script output as UTF-8: {message}")]
    OutputDecode {
        /// The decoder's description of the invalid sequence.
        message: String,
    },

    /// Waiting for the in-container command failed.
    #[error("script worker failed: {message}")]
    WorkerFailed {
        /// A description of the worker failure.
        message: String,
    },

    /// The worker was cancelled before the command finished.
    #[error("script worker was cancelled before completion")]
    Cancelled,

    /// The session was already disposed.
    #[error("execution session has been disposed")]
    SessionDisposed,
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied when accessing a path.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

/// Top-level error type for the vccpm application.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the application. At the application boundary (main.rs),
/// these errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum VccpmError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The repository could not be resolved to a local working copy.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// An error occurred during container operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred while running or reading a session.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// An error occurred during filesystem operations.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl VccpmError {
    /// Returns true when this error reports an elapsed execution deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Timeout { .. }))
    }
}

/// A specialised `Result` type for vccpm operations.
pub type Result<T> = std::result::Result<T, VccpmError>;
