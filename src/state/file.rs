//! JSON file state backend

use crate::error::{DockhandError, DockhandResult};
use crate::state::StateStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

/// On-disk layout of the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFile {
    /// Saved values
    values: BTreeMap<String, String>,

    /// When the file was last written
    updated_at: DateTime<Utc>,
}

/// State store keeping values in a JSON file.
///
/// Every read goes to disk so two processes see each other's writes.
/// Writes land in a sibling temp file that is renamed into place.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> DockhandResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| DockhandError::io(format!("reading {}", self.path.display()), e))?;

        let file: StateFile = serde_json::from_str(&content).map_err(|e| {
            DockhandError::State(format!("corrupt state file {}: {}", self.path.display(), e))
        })?;
        Ok(file.values)
    }

    async fn store(&self, values: BTreeMap<String, String>) -> DockhandResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DockhandError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(&StateFile {
            values,
            updated_at: Utc::now(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| DockhandError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DockhandError::io(format!("replacing {}", self.path.display()), e))?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> DockhandResult<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> DockhandResult<()> {
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.store(values).await
    }

    async fn clear(&self) -> DockhandResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await.map_err(|e| {
                DockhandError::io(format!("deleting state file {}", self.path.display()), e)
            })?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
