//! Container start, stop and removal.

use std::future::Future;
use std::pin::Pin;

use bollard::query_parameters::{
    RemoveContainerOptions, RemoveContainerOptionsBuilder, StartContainerOptions,
    StopContainerOptions, StopContainerOptionsBuilder,
};
use bollard::{Docker, errors::Error as BollardError};

use super::EngineConnector;
use crate::error::{ContainerError, VccpmError};

/// HTTP status the engine returns when a container is already stopped.
const NOT_MODIFIED: u16 = 304;

/// HTTP status the engine returns for an unknown container.
const NOT_FOUND: u16 = 404;

/// Boxed future type returned by [`ContainerLifecycleClient`] implementors.
pub type LifecycleFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Behaviour required to drive a container through its lifecycle.
pub trait ContainerLifecycleClient {
    /// Start a created container.
    fn start_container(&self, container_id: &str) -> LifecycleFuture<'_>;

    /// Stop a running container.
    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> LifecycleFuture<'_>;

    /// Remove a container.
    fn remove_container(
        &self,
        container_id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> LifecycleFuture<'_>;
}

impl ContainerLifecycleClient for Docker {
    fn start_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::start_container(self, &container_id_owned, None::<StartContainerOptions>).await
        })
    }

    fn stop_container(
        &self,
        container_id: &str,
        options: Option<StopContainerOptions>,
    ) -> LifecycleFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::stop_container(self, &container_id_owned, options).await })
    }

    fn remove_container(
        &self,
        container_id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> LifecycleFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::remove_container(self, &container_id_owned, options).await })
    }
}

fn has_status(error: &BollardError, expected: u16) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError { status_code, .. } if *status_code == expected
    )
}

impl EngineConnector {
    /// Start a created container.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StartFailed` when the engine refuses.
    pub async fn start_container_async<C: ContainerLifecycleClient>(
        client: &C,
        container_id: &str,
    ) -> Result<(), VccpmError> {
        client
            .start_container(container_id)
            .await
            .map_err(|error| {
                VccpmError::from(ContainerError::StartFailed {
                    container_id: String::from(container_id),
                    message: error.to_string(),
                })
            })
    }

    /// Stop a container, giving it `grace_secs` before it is killed.
    ///
    /// Stopping an already stopped container succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::StopFailed` for any other engine failure.
    pub async fn stop_container_async<C: ContainerLifecycleClient>(
        client: &C,
        container_id: &str,
        grace_secs: u64,
    ) -> Result<(), VccpmError> {
        let grace = i32::try_from(grace_secs).unwrap_or(i32::MAX);
        let options = StopContainerOptionsBuilder::new().t(grace).build();

        match client.stop_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(error) if has_status(&error, NOT_MODIFIED) => {
                tracing::debug!(container_id, "container already stopped");
                Ok(())
            }
            Err(error) => Err(VccpmError::from(ContainerError::StopFailed {
                container_id: String::from(container_id),
                message: error.to_string(),
            })),
        }
    }

    /// Force-remove a container.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RemoveFailed` when the engine refuses.
    pub async fn remove_container_async<C: ContainerLifecycleClient>(
        client: &C,
        container_id: &str,
    ) -> Result<(), VccpmError> {
        let options = RemoveContainerOptionsBuilder::new().force(true).build();
        client
            .remove_container(container_id, Some(options))
            .await
            .map_err(|error| {
                VccpmError::from(ContainerError::RemoveFailed {
                    container_id: String::from(container_id),
                    message: error.to_string(),
                })
            })
    }

    /// Force-remove a leftover container with this name, if any.
    ///
    /// Returns whether a container was removed.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RemoveFailed` for failures other than the
    /// container not existing.
    pub async fn remove_stale_container_async<C: ContainerLifecycleClient>(
        client: &C,
        container_name: &str,
    ) -> Result<bool, VccpmError> {
        let options = RemoveContainerOptionsBuilder::new().force(true).build();
        match client.remove_container(container_name, Some(options)).await {
            Ok(()) => {
                tracing::info!(container = container_name, "removed stale container");
                Ok(true)
            }
            Err(error) if has_status(&error, NOT_FOUND) => Ok(false),
            Err(error) => Err(VccpmError::from(ContainerError::RemoveFailed {
                container_id: String::from(container_name),
                message: error.to_string(),
            })),
        }
    }
}
