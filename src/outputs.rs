//! Step outputs
//!
//! Values other workflow steps can read: the builder in use and the image
//! tag that was built.

use crate::error::{DockhandError, DockhandResult};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

const OUTPUT_FILE_VAR: &str = "GITHUB_OUTPUT";

/// Output names
pub mod names {
    pub const BUILDER: &str = "builder";
    pub const IMAGE: &str = "image";
}

/// Render one record in the runner's multi-line file command format
pub(crate) fn file_command(key: &str, value: &str) -> String {
    let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
    format!("{key}<<{delimiter}\n{value}\n{delimiter}\n")
}

/// Destination for step outputs
pub trait OutputSink: Send + Sync {
    fn set(&self, name: &str, value: &str) -> DockhandResult<()>;
}

/// Writes to the `GITHUB_OUTPUT` file, or `name=value` lines on stdout
/// when there is none
#[derive(Debug, Clone, Default)]
pub struct StepOutputs {
    file: Option<PathBuf>,
}

impl StepOutputs {
    pub fn from_env() -> Self {
        Self {
            file: std::env::var_os(OUTPUT_FILE_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
        }
    }
}

impl OutputSink for StepOutputs {
    fn set(&self, name: &str, value: &str) -> DockhandResult<()> {
        let Some(path) = &self.file else {
            println!("{}={}", name, value);
            return Ok(());
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DockhandError::io(format!("opening {}", path.display()), e))?;
        file.write_all(file_command(name, value).as_bytes())
            .map_err(|e| DockhandError::io(format!("writing {}", path.display()), e))
    }
}
