//! Engine health checks.
//!
//! A ping confirms the engine is operational, not just that the socket is
//! reachable.

use std::time::Duration;

use bollard::Docker;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS, SocketResolver};
use crate::error::{ContainerError, VccpmError};

impl EngineConnector {
    /// Verify the container engine is responsive.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::HealthCheckFailed` if the engine does not
    /// respond correctly.
    ///
    /// Returns `ContainerError::HealthCheckTimeout` if the check times out.
    pub async fn health_check_async(docker: &Docker) -> Result<(), VccpmError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| ContainerError::HealthCheckTimeout {
                seconds: HEALTH_CHECK_TIMEOUT_SECS,
            })?
            .map_err(|e| ContainerError::HealthCheckFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Connect using fallback resolution and verify the engine responds.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EngineConnector::connect`] and
    /// [`EngineConnector::health_check_async`].
    pub async fn connect_with_fallback_and_verify_async<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<Docker, VccpmError> {
        let docker = Self::connect_with_fallback(config_socket, resolver)?;
        Self::health_check_async(&docker).await?;
        Ok(docker)
    }
}
