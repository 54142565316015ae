//! GitHub Actions state backend
//!
//! Values saved during main are appended to the file named by
//! `GITHUB_STATE`; the runner hands them back to the post invocation as
//! `STATE_<key>` environment variables.

use crate::error::{DockhandError, DockhandResult};
use crate::outputs::file_command;
use crate::state::StateStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const STATE_FILE_VAR: &str = "GITHUB_STATE";
const STATE_VAR_PREFIX: &str = "STATE_";

/// State store backed by the Actions runner
pub struct ActionsStateStore {
    state_file: PathBuf,
    /// `STATE_*` values the runner passed to this process
    inherited: HashMap<String, String>,
    /// Values written by this process, not yet visible through the environment
    written: Mutex<HashMap<String, String>>,
}

impl ActionsStateStore {
    /// Build from the process environment; `None` outside Actions
    pub fn from_env() -> Option<Self> {
        let state_file = std::env::var_os(STATE_FILE_VAR)?;
        let inherited = std::env::vars()
            .filter_map(|(name, value)| {
                name.strip_prefix(STATE_VAR_PREFIX)
                    .map(|key| (key.to_string(), value))
            })
            .collect();
        Some(Self::new(PathBuf::from(state_file), inherited))
    }

    pub fn new(state_file: PathBuf, inherited: HashMap<String, String>) -> Self {
        Self {
            state_file,
            inherited,
            written: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StateStore for ActionsStateStore {
    async fn get(&self, key: &str) -> DockhandResult<Option<String>> {
        let written = self
            .written
            .lock()
            .map_err(|_| DockhandError::State("state lock poisoned".to_string()))?
            .get(key)
            .cloned();
        Ok(written.or_else(|| self.inherited.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> DockhandResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.state_file)
            .await
            .map_err(|e| {
                DockhandError::io(format!("opening {}", self.state_file.display()), e)
            })?;

        file.write_all(file_command(key, value).as_bytes())
            .await
            .map_err(|e| DockhandError::io(format!("writing {}", self.state_file.display()), e))?;
        file.flush()
            .await
            .map_err(|e| DockhandError::io(format!("writing {}", self.state_file.display()), e))?;

        self.written
            .lock()
            .map_err(|_| DockhandError::State("state lock poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());

        debug!("Saved state {}", key);
        Ok(())
    }

    async fn clear(&self) -> DockhandResult<()> {
        // The runner discards job state when the job ends
        if let Ok(mut written) = self.written.lock() {
            written.clear();
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "github-actions"
    }
}
