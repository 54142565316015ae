//! Build cache lifecycle
//!
//! The main invocation restores the buildx local cache directory before the
//! build; the post invocation swaps in the directory the build wrote and
//! saves it under the commit's key.
//!
//! # Keys
//!
//! | Key | Value |
//! |-----|-------|
//! | primary | `{prefix}-{commit sha}` |
//! | restore | `{prefix}-` (newest match) |
//!
//! A restore that hits the primary key exactly makes the later save a
//! no-op. Every failure here is a non-fatal [`DockhandError::Cache`].

pub mod keys;
pub mod store;

pub use keys::CacheKey;
pub use store::{archive_name, CacheStore, LocalCacheStore};

use crate::config::schema::CacheConfig;
use crate::error::{DockhandError, DockhandResult};
use crate::state::JobState;
use crate::ui::{self, UiContext};
use std::path::Path;
use tracing::{debug, info};

fn into_cache_error(e: DockhandError) -> DockhandError {
    match e {
        DockhandError::Cache(_) => e,
        other => DockhandError::Cache(other.to_string()),
    }
}

/// Restores and saves the buildx cache directory
pub struct CacheManager<'a> {
    store: &'a dyn CacheStore,
    config: &'a CacheConfig,
    ui: &'a UiContext,
}

impl<'a> CacheManager<'a> {
    pub fn new(store: &'a dyn CacheStore, config: &'a CacheConfig, ui: &'a UiContext) -> Self {
        Self { store, config, ui }
    }

    /// Restore the newest cache matching `key` and record the key
    pub async fn restore(&self, key: &CacheKey, state: &JobState<'_>) -> DockhandResult<()> {
        let _group = ui::group(self.ui, "Restoring build cache");
        self.try_restore(key, state).await.map_err(into_cache_error)
    }

    async fn try_restore(&self, key: &CacheKey, state: &JobState<'_>) -> DockhandResult<()> {
        let primary = key.primary();
        state.set_cache_key(&primary).await?;

        let restore_keys = key.restore_keys();
        debug!("Cache backend: {}", self.store.backend_name());
        let restored = self
            .store
            .restore(&self.config.path, &primary, &restore_keys)
            .await?;

        let Some(restored) = restored else {
            let mut tried = vec![primary];
            tried.extend(restore_keys);
            info!("Cache not found for input keys: {}", tried.join(", "));
            return Ok(());
        };

        if key.is_exact_match(&restored) {
            state.set_cache_exact_match().await?;
        }
        info!("Cache restored from key: {}", restored);
        Ok(())
    }

    /// Save the cache the build wrote, unless the restore was exact
    pub async fn save(&self, state: &JobState<'_>) -> DockhandResult<()> {
        let _group = ui::group(self.ui, "Saving build cache");
        self.try_save(state).await.map_err(into_cache_error)
    }

    async fn try_save(&self, state: &JobState<'_>) -> DockhandResult<()> {
        let primary = state.cache_key().await?;
        if state.is_cache_exact_match().await? {
            info!(
                "Cache hit occurred on the primary key {}, not saving cache.",
                primary
            );
            return Ok(());
        }
        if primary.is_empty() {
            debug!("No cache key recorded, nothing to save");
            return Ok(());
        }

        replace_dir(&self.config.new_path, &self.config.path).await?;
        self.store.save(&self.config.path, &primary).await?;

        info!("Saved cache with key: {}", primary);
        Ok(())
    }
}

/// Replace `target` with `source` in a single rename
async fn replace_dir(source: &Path, target: &Path) -> DockhandResult<()> {
    if !source.is_dir() {
        return Err(DockhandError::Cache(format!(
            "build did not write a cache to {}",
            source.display()
        )));
    }

    match tokio::fs::remove_dir_all(target).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DockhandError::io(format!("removing {}", target.display()), e)),
    }

    tokio::fs::rename(source, target).await.map_err(|e| {
        DockhandError::io(
            format!("moving {} to {}", source.display(), target.display()),
            e,
        )
    })
}
