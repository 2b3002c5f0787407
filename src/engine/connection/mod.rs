//! Socket resolution and container engine connection.
//!
//! This module resolves the engine endpoint from configuration, environment
//! variables, or the platform default, and opens a Bollard client for it.
//! Submodules hold the per-concern engine calls used by the Docker-backed
//! container runtime.

mod context;
mod create_container;
mod error_classification;
mod exec;
mod health_check;
mod image;
mod lifecycle;
mod runtime;

use bollard::Docker;

use crate::error::VccpmError;
use error_classification::classify_connection_error;

pub use context::build_context_archive;
pub use create_container::{
    ContainerCreator, CreateContainerFuture, CreateContainerRequest, EngineSocketMount,
};
pub use exec::{ContainerExecClient, ExecOutput, ExecRequest};
pub use image::{BuildImageFuture, ImageBuilder, RemoveImageFuture};
pub use lifecycle::{ContainerLifecycleClient, LifecycleFuture};
pub use runtime::{
    DockerContainerInstance, DockerContainerRuntime, DockerRuntimeFactory, EngineClient,
};

/// Environment variable names checked in fallback order after configuration sources.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Connection timeout in seconds for Docker/Podman API connections.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Timeout in seconds for health check operations.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Default socket path for Unix platforms.
#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// Default socket path for Windows platforms.
#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Resolves container engine socket endpoints from environment variables.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use vccpm::engine::SocketResolver;
///
/// let env = DefaultEnv::new();
/// let resolver = SocketResolver::new(&env);
/// let socket = resolver.resolve_from_env();
/// ```
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a new socket resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Resolves the socket endpoint from `DOCKER_HOST`, `CONTAINER_HOST`,
    /// then `PODMAN_HOST`, skipping empty values.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default socket path.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// Classifies socket endpoint types for connection handling.
enum SocketType {
    /// Unix socket or Windows named pipe with explicit scheme.
    Socket,
    /// HTTP, HTTPS, or TCP endpoint (TCP is rewritten to HTTP).
    Http,
    /// Bare path without scheme prefix.
    BarePath,
}

impl SocketType {
    fn classify(socket: &str) -> Self {
        if socket.starts_with("unix://") || socket.starts_with("npipe://") {
            Self::Socket
        } else if ["tcp://", "http://", "https://"]
            .iter()
            .any(|scheme| socket.starts_with(scheme))
        {
            Self::Http
        } else {
            Self::BarePath
        }
    }
}

/// Opens Bollard clients for Docker or Podman endpoints.
pub struct EngineConnector;

impl EngineConnector {
    /// Connect to the container engine at the specified socket path.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://` (treated as HTTP), `http://`
    /// and `https://` endpoints. Bare paths starting with `\\` or `//` are
    /// treated as named pipes; any other bare path is a Unix socket.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::SocketNotFound` or
    /// `ContainerError::PermissionDenied` when the socket file is missing or
    /// unreadable, and `ContainerError::ConnectionFailed` otherwise.
    pub fn connect(socket: &str) -> Result<Docker, VccpmError> {
        let socket_uri = match SocketType::classify(socket) {
            SocketType::Socket | SocketType::Http => socket.to_owned(),
            SocketType::BarePath => Self::normalize_bare_path(socket),
        };

        let connected = match SocketType::classify(&socket_uri) {
            SocketType::Http => Docker::connect_with_http(
                &socket_uri.replacen("tcp://", "http://", 1),
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            SocketType::Socket | SocketType::BarePath => Docker::connect_with_socket(
                &socket_uri,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
        };

        connected.map_err(|e| VccpmError::from(classify_connection_error(&e, &socket_uri)))
    }

    /// Prefix a bare path with `npipe://` or `unix://` based on its syntax.
    fn normalize_bare_path(path: &str) -> String {
        if path.starts_with("\\\\") || path.starts_with("//") {
            format!("npipe://{path}")
        } else {
            format!("unix://{path}")
        }
    }

    /// Connect using the resolved socket from configuration and environment.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::connect`].
    pub fn connect_with_fallback<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<Docker, VccpmError> {
        let socket = Self::resolve_socket(config_socket, resolver);
        tracing::debug!(%socket, "connecting to container engine");
        Self::connect(&socket)
    }

    /// Resolves the socket endpoint without establishing a connection.
    ///
    /// Resolution order:
    /// 1. `config_socket` (from CLI, config file, or `VCCPM_ENGINE_SOCKET`)
    /// 2. `DOCKER_HOST`, `CONTAINER_HOST`, `PODMAN_HOST` (via resolver)
    /// 3. Platform default socket
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }
}
