//! Container creation from a freshly built image.
//!
//! This module translates a [`CreateContainerRequest`] into a Bollard
//! container-create payload. Containers are created with a pseudo-terminal
//! and open stdin so the image's default command stays alive for exec.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::models::{ContainerCreateBody, ContainerCreateResponse, HostConfig};
use bollard::query_parameters::{CreateContainerOptions, CreateContainerOptionsBuilder};
use camino::{Utf8Path, Utf8PathBuf};

use super::EngineConnector;
use crate::error::{ConfigError, ContainerError, VccpmError};

/// Boxed future type returned by [`ContainerCreator`] implementors.
pub type CreateContainerFuture<'a> = Pin<
    Box<dyn Future<Output = Result<ContainerCreateResponse, bollard::errors::Error>> + Send + 'a>,
>;

/// Behaviour required to create a container via a backing engine client.
pub trait ContainerCreator {
    /// Create a container from Bollard options and body payload.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_>;
}

impl ContainerCreator for Docker {
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_> {
        Box::pin(async move { Self::create_container(self, options, config).await })
    }
}

/// Host engine socket bind-mounted into the container at the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSocketMount {
    host_path: Utf8PathBuf,
}

impl EngineSocketMount {
    /// Mount the socket found at `host_path`.
    #[must_use]
    pub fn new(host_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
        }
    }

    /// Return the host socket path.
    #[must_use]
    pub fn host_path(&self) -> &Utf8Path {
        &self.host_path
    }

    fn bind(&self) -> String {
        format!("{0}:{0}", self.host_path)
    }
}

/// Container-creation request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerRequest {
    image: String,
    name: String,
    socket_mount: Option<EngineSocketMount>,
}

impl CreateContainerRequest {
    /// Create a request for a container named `name` running `image`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `image` or `name` is blank.
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Result<Self, VccpmError> {
        let image_value = image.into();
        let name_value = name.into();

        Ok(Self {
            image: String::from(validate_required("image", &image_value)?),
            name: String::from(validate_required("container name", &name_value)?),
            socket_mount: None,
        })
    }

    /// Attach an optional engine socket mount.
    #[must_use]
    pub fn with_socket_mount(mut self, socket_mount: Option<EngineSocketMount>) -> Self {
        self.socket_mount = socket_mount;
        self
    }

    /// Return the configured image.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Return the configured container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the optional engine socket mount.
    #[must_use]
    pub const fn socket_mount(&self) -> Option<&EngineSocketMount> {
        self.socket_mount.as_ref()
    }
}

impl EngineConnector {
    /// Create a container using a provided client abstraction.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::CreateFailed` when the engine rejects the
    /// create request.
    pub async fn create_container_async<C: ContainerCreator>(
        creator: &C,
        request: &CreateContainerRequest,
    ) -> Result<String, VccpmError> {
        let options = CreateContainerOptionsBuilder::new()
            .name(request.name())
            .build();
        let config = build_create_body(request);

        let response = creator
            .create_container(Some(options), config)
            .await
            .map_err(|error| {
                VccpmError::from(ContainerError::CreateFailed {
                    message: format!("{}: {error}", request.name()),
                })
            })?;

        for warning in &response.warnings {
            tracing::warn!(container = request.name(), %warning, "engine create warning");
        }

        Ok(response.id)
    }
}

fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, VccpmError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(VccpmError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }

    Ok(trimmed)
}

fn build_create_body(request: &CreateContainerRequest) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(String::from(request.image())),
        tty: Some(true),
        open_stdin: Some(true),
        host_config: Some(HostConfig {
            binds: request.socket_mount().map(|mount| vec![mount.bind()]),
            ..HostConfig::default()
        }),
        ..ContainerCreateBody::default()
    }
}
