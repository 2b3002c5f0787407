//! Docker-backed container runtime.
//!
//! Composes the per-concern engine calls into the session runtime seams: a
//! runtime builds an image from the repository and starts one container from
//! it; the instance runs a single attached exec and collects its stdout.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bollard::Docker;

use super::EngineConnector;
use super::context::build_context_archive;
use super::create_container::{ContainerCreator, CreateContainerRequest, EngineSocketMount};
use super::exec::{AttachedExec, ContainerExecClient, ExecRequest, exec_failed};
use super::image::ImageBuilder;
use super::lifecycle::ContainerLifecycleClient;
use crate::config::ContainerConfig;
use crate::error::{ContainerError, VccpmError};
use crate::session::{
    BuildContext, ContainerInstance, ContainerRuntime, ContainerRuntimeFactory, RuntimeFuture,
};

/// Every engine capability the runtime needs.
pub trait EngineClient:
    ImageBuilder + ContainerCreator + ContainerLifecycleClient + ContainerExecClient + Send + Sync + 'static
{
}

impl<T> EngineClient for T where
    T: ImageBuilder
        + ContainerCreator
        + ContainerLifecycleClient
        + ContainerExecClient
        + Send
        + Sync
        + 'static
{
}

/// Creates [`DockerContainerRuntime`]s sharing one engine client.
#[derive(Debug)]
pub struct DockerRuntimeFactory<C = Docker> {
    client: Arc<C>,
    config: ContainerConfig,
}

impl<C> DockerRuntimeFactory<C> {
    /// Create a factory over `client` using the container settings in `config`.
    #[must_use]
    pub const fn new(client: Arc<C>, config: ContainerConfig) -> Self {
        Self { client, config }
    }
}

impl<C: EngineClient> ContainerRuntimeFactory for DockerRuntimeFactory<C> {
    type Runtime = DockerContainerRuntime<C>;

    fn create(&self, context: BuildContext) -> Self::Runtime {
        DockerContainerRuntime {
            client: Arc::clone(&self.client),
            context,
            config: self.config.clone(),
            image: Mutex::new(None),
        }
    }
}

/// Builds the repository image and owns it until disposed.
pub struct DockerContainerRuntime<C = Docker> {
    client: Arc<C>,
    context: BuildContext,
    config: ContainerConfig,
    image: Mutex<Option<String>>,
}

impl<C> fmt::Debug for DockerContainerRuntime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerContainerRuntime")
            .field("context", &self.context)
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

impl<C: EngineClient> DockerContainerRuntime<C> {
    async fn build_image(&self, tag: &str) -> Result<(), VccpmError> {
        let context_dir = self.context.path().to_owned();
        let archive = tokio::task::spawn_blocking(move || build_context_archive(&context_dir))
            .await
            .map_err(|error| {
                VccpmError::from(ContainerError::ImageBuildFailed {
                    image: String::from(tag),
                    message: format!("packing build context panicked: {error}"),
                })
            })??;

        tracing::info!(image = tag, context = %self.context.path(), "building image");
        EngineConnector::build_image_async(self.client.as_ref(), tag, archive).await?;
        *self.image.lock().unwrap_or_else(PoisonError::into_inner) = Some(String::from(tag));
        Ok(())
    }

    async fn create_and_start(&self, name: &str) -> Result<String, VccpmError> {
        let socket_mount = self
            .context
            .socket_access()
            .then(|| EngineSocketMount::new(self.config.host_socket_path.clone()));
        let request = CreateContainerRequest::new(name, name)?.with_socket_mount(socket_mount);
        let container_id =
            EngineConnector::create_container_async(self.client.as_ref(), &request).await?;

        if let Err(error) =
            EngineConnector::start_container_async(self.client.as_ref(), &container_id).await
        {
            if let Err(remove_error) =
                EngineConnector::remove_container_async(self.client.as_ref(), &container_id).await
            {
                tracing::warn!(container = name, error = %remove_error, "removing unstarted container failed");
            }
            return Err(error);
        }

        tracing::info!(container = name, %container_id, "container started");
        Ok(container_id)
    }
}

impl<C: EngineClient> ContainerRuntime for DockerContainerRuntime<C> {
    type Instance = DockerContainerInstance<C>;

    fn start<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, Self::Instance> {
        Box::pin(async move {
            if self.config.replace_stale {
                EngineConnector::remove_stale_container_async(self.client.as_ref(), name).await?;
            }
            self.build_image(name).await?;
            let container_id = self.create_and_start(name).await?;

            Ok(DockerContainerInstance {
                client: Arc::clone(&self.client),
                container_id,
                name: String::from(name),
                stop_timeout_secs: self.config.stop_timeout_secs,
                pending: Mutex::new(None),
                stdout: OnceLock::new(),
            })
        })
    }

    fn dispose(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            let image = self
                .image
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let Some(tag) = image else {
                return Ok(());
            };

            EngineConnector::remove_image_async(self.client.as_ref(), &tag).await?;
            tracing::info!(image = %tag, "image removed");
            Ok(())
        })
    }
}

/// A started container running at most one attached command.
pub struct DockerContainerInstance<C = Docker> {
    client: Arc<C>,
    container_id: String,
    name: String,
    stop_timeout_secs: u64,
    pending: Mutex<Option<AttachedExec>>,
    stdout: OnceLock<Vec<u8>>,
}

impl<C> fmt::Debug for DockerContainerInstance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerContainerInstance")
            .field("container_id", &self.container_id)
            .field("name", &self.name)
            .field("stop_timeout_secs", &self.stop_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl<C> DockerContainerInstance<C> {
    /// Return the engine-assigned container identifier.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    fn take_pending(&self) -> Option<AttachedExec> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<C: EngineClient> ContainerInstance for DockerContainerInstance<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute_command<'a>(&'a self, command: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let already_issued = self.stdout.get().is_some()
                || self
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some();
            if already_issued {
                return Err(exec_failed(&self.container_id, "a command was already issued"));
            }

            let request = ExecRequest::shell(self.container_id.as_str(), command)?;
            let attached =
                EngineConnector::start_attached_exec_async(self.client.as_ref(), &request).await?;
            *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(attached);
            Ok(())
        })
    }

    fn wait(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            let attached = self
                .take_pending()
                .ok_or_else(|| exec_failed(&self.container_id, "no command has been issued"))?;
            let output =
                EngineConnector::collect_exec_output_async(self.client.as_ref(), attached).await?;

            if output.exit_code() != 0 {
                tracing::warn!(container = %self.name, exit_code = output.exit_code(), "script exited with non-zero status");
            }
            drop(self.stdout.set(output.into_stdout()));
            Ok(())
        })
    }

    fn stdout(&self) -> Option<Vec<u8>> {
        self.stdout.get().cloned()
    }

    fn stop(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            EngineConnector::stop_container_async(
                self.client.as_ref(),
                &self.container_id,
                self.stop_timeout_secs,
            )
            .await?;
            tracing::info!(container = %self.name, "container stopped");
            Ok(())
        })
    }

    fn remove(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            EngineConnector::remove_container_async(self.client.as_ref(), &self.container_id)
                .await?;
            tracing::info!(container = %self.name, "container removed");
            Ok(())
        })
    }
}
