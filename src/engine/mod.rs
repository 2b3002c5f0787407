//! Container engine connection and the Docker-backed runtime.
//!
//! The socket endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `VCCPM_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. `PODMAN_HOST` environment variable
//! 7. Platform default (`/var/run/docker.sock` on Unix)

mod connection;

pub use connection::{
    BuildImageFuture, ContainerCreator, ContainerExecClient, ContainerLifecycleClient,
    CreateContainerFuture, CreateContainerRequest, DockerContainerInstance,
    DockerContainerRuntime, DockerRuntimeFactory, EngineClient, EngineConnector,
    EngineSocketMount, ExecOutput, ExecRequest, ImageBuilder, LifecycleFuture, RemoveImageFuture,
    SocketResolver, build_context_archive,
};
