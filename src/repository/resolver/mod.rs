//! Clone, reuse or refresh decisions for a repository URL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{RepositoryManager, RepositoryReference};
use crate::error::VccpmError;

/// Resolves a clone URL to an up-to-date local working copy.
///
/// Resolution for the same URL is serialised through a per-URL async lock so
/// one caller's refresh never races another caller's reuse. Different URLs
/// resolve concurrently.
#[derive(Debug)]
pub struct RepositoryResolver<M> {
    manager: M,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<M: RepositoryManager> RepositoryResolver<M> {
    /// Create a resolver over `manager`.
    #[must_use]
    pub fn new(manager: M) -> Self {
        Self {
            manager,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the wrapped repository manager.
    #[must_use]
    pub const fn manager(&self) -> &M {
        &self.manager
    }

    fn lock_for(&self, url: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(String::from(url)).or_default())
    }

    /// Forget the lock for `url` when no other caller holds or awaits it.
    fn release(&self, url: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One owner is the map, the other is `lock`.
        if Arc::strong_count(lock) == 2 {
            locks.remove(url);
        }
    }

    #[cfg(test)]
    fn tracked_urls(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Return a working copy of `url` matching the remote head.
    ///
    /// Clones when no local copy exists, reuses it when the remote head is
    /// unchanged, and clones again when the remote head moved. The returned
    /// reference reports `cloned_locally` only when the copy was reused.
    ///
    /// # Errors
    ///
    /// Returns the `RepositoryError` raised by the manager; nothing is
    /// retried.
    pub async fn resolve(&self, url: &str) -> Result<RepositoryReference, VccpmError> {
        let lock = self.lock_for(url);
        let resolved = {
            let _held = lock.lock().await;
            self.resolve_locked(url).await
        };
        self.release(url, &lock);
        resolved
    }

    async fn resolve_locked(&self, url: &str) -> Result<RepositoryReference, VccpmError> {
        if !self.manager.is_cloned_locally(url).await? {
            tracing::info!(%url, "repository not cached; cloning");
            let cloned = self.manager.clone_repository(url).await?;
            return Ok(cloned.with_cloned_locally(false));
        }

        let existing = self.manager.existing_repository(url).await?;
        if self.manager.is_remote_different(url).await? {
            tracing::info!(%url, "remote head moved; refreshing clone");
            let refreshed = self.manager.clone_repository(url).await?;
            return Ok(refreshed.with_cloned_locally(false));
        }

        tracing::info!(%url, path = %existing.path(), "reusing cached clone");
        Ok(existing.with_cloned_locally(true))
    }
}
