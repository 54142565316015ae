//! Cross-invocation job state
//!
//! The main and post invocations of a job are separate processes. They
//! share a small key/value store that the host keeps for the lifetime of
//! the job. Backends:
//!
//! - [`ActionsStateStore`]: GitHub Actions `GITHUB_STATE` file and `STATE_*`
//!   variables
//! - [`FileStateStore`]: a JSON file, for runners outside Actions
//! - [`MemoryStateStore`]: in-process map, for tests

mod actions;
mod file;
mod memory;

pub use actions::ActionsStateStore;
pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::config::schema::StateConfig;
use crate::config::ConfigManager;
use crate::error::DockhandResult;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// State keys shared by main and post
pub mod keys {
    pub const IS_POST: &str = "isPost";
    pub const REGISTRY: &str = "registry";
    pub const BUILDER_NAME: &str = "builderName";
    pub const CACHE_KEY: &str = "cacheKey";
    pub const CACHE_EXACT_MATCH: &str = "cacheExactMatch";
    pub const EXTRA_REGISTRIES: &str = "extraRegistries";
}

/// Durable key/value store shared between invocations of one job
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value; `None` when never written
    async fn get(&self, key: &str) -> DockhandResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> DockhandResult<()>;

    /// Drop all values once the job no longer needs them
    async fn clear(&self) -> DockhandResult<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Pick the state backend for this process.
///
/// An explicit file wins; otherwise GitHub Actions state is used when the
/// host provides it, and a JSON file in the state directory when it does not.
pub fn open_store(
    config: &StateConfig,
    explicit_file: Option<PathBuf>,
) -> DockhandResult<Box<dyn StateStore>> {
    if let Some(path) = explicit_file {
        return Ok(Box::new(FileStateStore::new(path)));
    }

    if let Some(store) = ActionsStateStore::from_env() {
        return Ok(Box::new(store));
    }

    let path = config
        .file
        .clone()
        .unwrap_or_else(ConfigManager::default_state_file);
    Ok(Box::new(FileStateStore::new(path)))
}

/// Typed view over the job state keys
pub struct JobState<'a> {
    store: &'a dyn StateStore,
}

impl<'a> JobState<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self { store }
    }

    async fn get_string(&self, key: &str) -> DockhandResult<String> {
        Ok(self.store.get(key).await?.unwrap_or_default())
    }

    async fn get_flag(&self, key: &str) -> DockhandResult<bool> {
        Ok(self.store.get(key).await?.as_deref() == Some("true"))
    }

    /// Whether the main invocation already ran for this job
    pub async fn is_post(&self) -> DockhandResult<bool> {
        self.get_flag(keys::IS_POST).await
    }

    pub async fn mark_post(&self) -> DockhandResult<()> {
        self.store.set(keys::IS_POST, "true").await
    }

    /// Registry host logged into during main; empty when none
    pub async fn registry(&self) -> DockhandResult<String> {
        self.get_string(keys::REGISTRY).await
    }

    pub async fn set_registry(&self, registry: &str) -> DockhandResult<()> {
        self.store.set(keys::REGISTRY, registry).await
    }

    /// Builder created during main; empty when none was created
    pub async fn builder_name(&self) -> DockhandResult<String> {
        self.get_string(keys::BUILDER_NAME).await
    }

    pub async fn set_builder_name(&self, name: &str) -> DockhandResult<()> {
        self.store.set(keys::BUILDER_NAME, name).await
    }

    pub async fn cache_key(&self) -> DockhandResult<String> {
        self.get_string(keys::CACHE_KEY).await
    }

    pub async fn set_cache_key(&self, key: &str) -> DockhandResult<()> {
        self.store.set(keys::CACHE_KEY, key).await
    }

    pub async fn is_cache_exact_match(&self) -> DockhandResult<bool> {
        self.get_flag(keys::CACHE_EXACT_MATCH).await
    }

    pub async fn set_cache_exact_match(&self) -> DockhandResult<()> {
        self.store.set(keys::CACHE_EXACT_MATCH, "true").await
    }

    /// Additional registries logged into during main
    pub async fn extra_registries(&self) -> DockhandResult<Vec<String>> {
        Ok(self
            .get_string(keys::EXTRA_REGISTRIES)
            .await?
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn add_extra_registry(&self, host: &str) -> DockhandResult<()> {
        let mut hosts = self.extra_registries().await?;
        if hosts.iter().any(|h| h == host) {
            return Ok(());
        }
        hosts.push(host.to_string());
        self.store.set(keys::EXTRA_REGISTRIES, &hosts.join("\n")).await
    }

    /// Forget everything; called at the end of post
    pub async fn clear(&self) -> DockhandResult<()> {
        debug!("Clearing job state ({})", self.store.backend_name());
        self.store.clear().await
    }
}
