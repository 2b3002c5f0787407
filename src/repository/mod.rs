//! Repository resolution.
//!
//! A [`RepositoryManager`] owns the on-disk clone cache. The
//! [`RepositoryResolver`] decides per request whether to clone, reuse, or
//! refresh a working copy, serialising work on the same URL.

mod git_cli;
mod resolver;

use std::future::Future;
use std::pin::Pin;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{RepositoryError, VccpmError};

pub use git_cli::GitCliRepositoryManager;
pub use resolver::RepositoryResolver;

/// Boxed future type returned by [`RepositoryManager`] implementors.
pub type RepositoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VccpmError>> + Send + 'a>>;

/// A local working copy of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    url: String,
    path: Utf8PathBuf,
    cloned_locally: bool,
}

impl RepositoryReference {
    /// Describe the working copy of `url` checked out at `path`.
    ///
    /// The reference starts out as freshly cloned.
    #[must_use]
    pub fn new(url: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            cloned_locally: false,
        }
    }

    /// Mark whether the working copy already existed and was reused.
    #[must_use]
    pub const fn with_cloned_locally(mut self, cloned_locally: bool) -> Self {
        self.cloned_locally = cloned_locally;
        self
    }

    /// Report whether an existing working copy was reused instead of cloned.
    #[must_use]
    pub const fn cloned_locally(&self) -> bool {
        self.cloned_locally
    }

    /// Return the clone URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the working copy directory, which is also the build context.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Behaviour required to maintain local clones of remote repositories.
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryManager: Send + Sync {
    /// Report whether a working copy of `url` exists locally.
    fn is_cloned_locally(&self, url: &str) -> RepositoryFuture<'_, bool>;

    /// Clone `url`, replacing any existing working copy.
    fn clone_repository(&self, url: &str) -> RepositoryFuture<'_, RepositoryReference>;

    /// Return the existing working copy of `url`.
    fn existing_repository(&self, url: &str) -> RepositoryFuture<'_, RepositoryReference>;

    /// Report whether the remote head differs from the local head.
    fn is_remote_different(&self, url: &str) -> RepositoryFuture<'_, bool>;
}

/// Derive the project name from a clone URL.
///
/// The name is the last path segment after `/` or `:`, with trailing slashes
/// and a `.git` suffix removed. Case is preserved.
///
/// # Errors
///
/// Returns `RepositoryError::InvalidUrl` when no name remains.
pub fn project_name_from_url(url: &str) -> Result<String, VccpmError> {
    let trimmed = url.trim().trim_end_matches('/');
    let last_segment = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = last_segment.strip_suffix(".git").unwrap_or(last_segment);

    if name.is_empty() {
        return Err(VccpmError::from(RepositoryError::InvalidUrl {
            url: String::from(url),
            reason: String::from("no project name after the last '/' or ':'"),
        }));
    }

    Ok(String::from(name))
}

#[cfg(test)]
mod tests;
