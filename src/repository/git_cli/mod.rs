//! Repository manager backed by the `git` command-line client.
//!
//! Each URL is cloned into `<cache_dir>/<project_name>-<key>`, where `key` is
//! the first bytes of the URL's SHA-256 in hex, so two remotes sharing a
//! project name never share a working copy. A directory counts as cloned when
//! it holds a `.git` entry. Refreshing deletes the directory and clones again.

use std::process::Stdio;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use sha2::{Digest, Sha256};
use tokio::process::Command;

use super::{RepositoryFuture, RepositoryManager, RepositoryReference, project_name_from_url};
use crate::config::RepositoryConfig;
use crate::error::{FilesystemError, RepositoryError, VccpmError};

/// Bytes of the URL digest kept in a working copy name.
const URL_KEY_BYTES: usize = 6;

/// Clones and inspects repositories with the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCliRepositoryManager {
    git_binary: String,
    cache_dir: Utf8PathBuf,
}

impl GitCliRepositoryManager {
    /// Create a manager using `git_binary` and the clone cache at `cache_dir`.
    #[must_use]
    pub fn new(git_binary: impl Into<String>, cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Create a manager from the `[repository]` configuration section.
    #[must_use]
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self::new(config.git_binary.clone(), config.cache_dir.clone())
    }

    /// Return the working copy directory for `url`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidUrl` when the URL has no project name.
    pub fn working_copy_dir(&self, url: &str) -> Result<Utf8PathBuf, VccpmError> {
        Ok(self.cache_dir.join(working_copy_name(url)?))
    }

    fn open_cache_dir(&self) -> Result<Dir, VccpmError> {
        Dir::create_ambient_dir_all(&self.cache_dir, ambient_authority())
            .and_then(|()| Dir::open_ambient_dir(&self.cache_dir, ambient_authority()))
            .map_err(|error| {
                VccpmError::from(FilesystemError::IoError {
                    path: self.cache_dir.as_std_path().to_path_buf(),
                    message: error.to_string(),
                })
            })
    }

    fn is_cloned(&self, url: &str) -> Result<bool, VccpmError> {
        let entry = working_copy_name(url)?;
        let cache = self.open_cache_dir()?;
        Ok(cache.exists(Utf8Path::new(&entry).join(".git")))
    }

    async fn clone_fresh(&self, url: &str) -> Result<RepositoryReference, VccpmError> {
        let entry = working_copy_name(url)?;
        let target = self.cache_dir.join(&entry);
        let cache = self.open_cache_dir()?;

        if cache.exists(&entry) {
            tracing::debug!(path = %target, "removing previous working copy");
            let removal = tokio::task::spawn_blocking(move || cache.remove_dir_all(&entry))
                .await
                .map_err(|error| std::io::Error::other(error.to_string()))
                .and_then(|result| result);
            removal.map_err(|error| {
                VccpmError::from(FilesystemError::IoError {
                    path: target.as_std_path().to_path_buf(),
                    message: error.to_string(),
                })
            })?;
        }

        tracing::info!(%url, path = %target, "cloning repository");
        self.run_git(&["clone", "--quiet", url, target.as_str()])
            .await
            .map_err(|message| {
                VccpmError::from(RepositoryError::CloneFailed {
                    url: String::from(url),
                    message,
                })
            })?;

        Ok(RepositoryReference::new(url, target))
    }

    async fn remote_differs(&self, url: &str) -> Result<bool, VccpmError> {
        let target = self.working_copy_dir(url)?;
        let query_failed = |message: String| {
            VccpmError::from(RepositoryError::CommitQueryFailed {
                url: String::from(url),
                message,
            })
        };

        let local = self
            .run_git(&["-C", target.as_str(), "rev-parse", "HEAD"])
            .await
            .map_err(query_failed)?;
        let remote_listing = self
            .run_git(&["ls-remote", url, "HEAD"])
            .await
            .map_err(query_failed)?;
        let remote = first_token(&remote_listing)
            .ok_or_else(|| query_failed(String::from("remote reported no HEAD commit")))?;

        let local_head = local.trim();
        tracing::debug!(%url, local_head, remote, "compared head commits");
        Ok(local_head != remote)
    }

    /// Run git with `args`, returning trimmed stdout or an error description.
    async fn run_git(&self, args: &[&str]) -> Result<String, String> {
        let output = Command::new(&self.git_binary)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|error| format!("failed to run {}: {error}", self.git_binary))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        if detail.is_empty() {
            Err(format!("git exited with {}", output.status))
        } else {
            Err(format!("git exited with {}: {detail}", output.status))
        }
    }
}

/// Name of the cache entry holding the working copy of `url`.
fn working_copy_name(url: &str) -> Result<String, VccpmError> {
    let project = project_name_from_url(url)?;
    let digest = Sha256::digest(url.trim().as_bytes());
    let key: Vec<u8> = digest.iter().take(URL_KEY_BYTES).copied().collect();
    Ok(format!("{project}-{}", hex::encode(key)))
}

fn first_token(listing: &str) -> Option<&str> {
    listing.split_whitespace().next()
}

impl RepositoryManager for GitCliRepositoryManager {
    fn is_cloned_locally(&self, url: &str) -> RepositoryFuture<'_, bool> {
        let url_owned = String::from(url);
        Box::pin(async move { self.is_cloned(&url_owned) })
    }

    fn clone_repository(&self, url: &str) -> RepositoryFuture<'_, RepositoryReference> {
        let url_owned = String::from(url);
        Box::pin(async move { self.clone_fresh(&url_owned).await })
    }

    fn existing_repository(&self, url: &str) -> RepositoryFuture<'_, RepositoryReference> {
        let url_owned = String::from(url);
        Box::pin(async move {
            if !self.is_cloned(&url_owned)? {
                return Err(VccpmError::from(RepositoryError::NotClonedLocally {
                    url: url_owned,
                }));
            }
            let path = self.working_copy_dir(&url_owned)?;
            Ok(RepositoryReference::new(url_owned, path))
        })
    }

    fn is_remote_different(&self, url: &str) -> RepositoryFuture<'_, bool> {
        let url_owned = String::from(url);
        Box::pin(async move { self.remote_differs(&url_owned).await })
    }
}
