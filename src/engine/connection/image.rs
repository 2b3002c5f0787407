//! Image build and removal.

use std::future::Future;
use std::pin::Pin;

use bollard::models::BuildInfo;
use bollard::query_parameters::{
    BuildImageOptions, BuildImageOptionsBuilder, RemoveImageOptions, RemoveImageOptionsBuilder,
};
use bollard::{Docker, body_full, errors::Error as BollardError};
use futures_util::StreamExt;

use super::EngineConnector;
use crate::error::{ContainerError, VccpmError};

/// Boxed future type returned by [`ImageBuilder::build_image`].
pub type BuildImageFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<BuildInfo>, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ImageBuilder::remove_image`].
pub type RemoveImageFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Behaviour required to build and remove images.
pub trait ImageBuilder {
    /// Build an image from a tar build context, returning every progress record.
    fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> BuildImageFuture<'_>;

    /// Remove an image by tag.
    fn remove_image(&self, image: &str, options: Option<RemoveImageOptions>)
    -> RemoveImageFuture<'_>;
}

impl ImageBuilder for Docker {
    fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> BuildImageFuture<'_> {
        Box::pin(async move {
            let mut stream = Self::build_image(self, options, None, Some(body_full(context.into())));
            let mut records = vec![];
            while let Some(record) = stream.next().await {
                records.push(record?);
            }
            Ok(records)
        })
    }

    fn remove_image(
        &self,
        image: &str,
        options: Option<RemoveImageOptions>,
    ) -> RemoveImageFuture<'_> {
        let image_owned = String::from(image);
        Box::pin(async move {
            Self::remove_image(self, &image_owned, options, None)
                .await
                .map(drop)
        })
    }
}

impl EngineConnector {
    /// Build the image tagged `tag` from the `Dockerfile` at the context root.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImageBuildFailed` when the engine rejects the
    /// request or reports a build step failure.
    pub async fn build_image_async<B: ImageBuilder>(
        builder: &B,
        tag: &str,
        context: Vec<u8>,
    ) -> Result<(), VccpmError> {
        let options = BuildImageOptionsBuilder::new()
            .dockerfile("Dockerfile")
            .t(tag)
            .rm(true)
            .build();

        let records = builder
            .build_image(options, context)
            .await
            .map_err(|error| build_failed(tag, error.to_string()))?;

        for record in records {
            if let Some(line) = record.stream.as_deref().map(str::trim_end)
                && !line.is_empty()
            {
                tracing::debug!(image = tag, "{line}");
            }
            if let Some(message) = record.error_detail.and_then(|detail| detail.message) {
                return Err(build_failed(tag, message));
            }
        }

        tracing::info!(image = tag, "image built");
        Ok(())
    }

    /// Force-remove the image tagged `tag`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImageRemoveFailed` when the engine rejects the
    /// removal.
    pub async fn remove_image_async<B: ImageBuilder>(
        builder: &B,
        tag: &str,
    ) -> Result<(), VccpmError> {
        let options = RemoveImageOptionsBuilder::new().force(true).build();
        builder
            .remove_image(tag, Some(options))
            .await
            .map_err(|error| {
                VccpmError::from(ContainerError::ImageRemoveFailed {
                    image: String::from(tag),
                    message: error.to_string(),
                })
            })
    }
}

fn build_failed(tag: &str, message: String) -> VccpmError {
    VccpmError::from(ContainerError::ImageBuildFailed {
        image: String::from(tag),
        message,
    })
}
