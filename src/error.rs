//! Error types for Dockhand
//!
//! All modules use `DockhandResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Dockhand operations
pub type DockhandResult<T> = Result<T, DockhandError>;

/// All errors that can occur in Dockhand
#[derive(Error, Debug)]
pub enum DockhandError {
    // Registry errors
    #[error("Could not determine registry for repository {repository:?}: {reason}")]
    Classification { repository: String, reason: String },

    #[error("Registry credential error: {0}")]
    Credential(String),

    #[error("Failed to provision repository {repository}: {reason}")]
    RepositoryProvision { repository: String, reason: String },

    #[error("Login to {registry} failed: {reason}")]
    Login { registry: String, reason: String },

    #[error("Logout from {registry} failed: {reason}")]
    Logout { registry: String, reason: String },

    // Build errors
    #[error("Build failed: {0}")]
    Build(String),

    #[error("Builder setup failed: {0}")]
    Builder(String),

    #[error("Failed to remove builder {name}: {reason}")]
    BuilderTeardown { name: String, reason: String },

    #[error("Could not derive tag prefix: {0}")]
    TagPrefix(String),

    // Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Input and configuration errors
    #[error("Invalid input {name}: {reason}")]
    InputInvalid { name: String, reason: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to persist job state: {0}")]
    State(String),

    #[error("Required CLI not found: {name}. {hint}")]
    CliNotFound { name: String, hint: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl DockhandError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a classification error for a repository address
    pub fn classification(repository: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Classification {
            repository: repository.into(),
            reason: reason.into(),
        }
    }

    /// Create an input validation error
    pub fn input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the main phase.
    ///
    /// Cache failures and post-phase cleanup failures are reported as
    /// warnings and never change the job outcome.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Cache(_) | Self::BuilderTeardown { .. } | Self::Logout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Classification { .. } => Some("Use org/app, host.tld/org/app or an ECR address"),
            Self::Credential(_) => Some("Check the AWS CLI install and credentials"),
            Self::TagPrefix(_) => Some("Set skip-tag-with-prefix for this event"),
            Self::CliNotFound { .. } => Some("Install the missing tool on the runner image"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DockhandError::classification("_test", "invalid first character");
        assert!(err.to_string().contains("Could not determine registry"));
        assert!(err.to_string().contains("_test"));
    }

    #[test]
    fn error_hint() {
        let err = DockhandError::TagPrefix("unknown event".to_string());
        assert!(err.hint().unwrap().contains("skip-tag-with-prefix"));
        assert_eq!(DockhandError::Build("x".to_string()).hint(), None);
    }

    #[test]
    fn cleanup_errors_are_not_fatal() {
        assert!(!DockhandError::Cache("miss".to_string()).is_fatal());
        assert!(!DockhandError::Logout {
            registry: "docker.io".to_string(),
            reason: "not logged in".to_string(),
        }
        .is_fatal());
        assert!(!DockhandError::BuilderTeardown {
            name: "builder-1".to_string(),
            reason: "gone".to_string(),
        }
        .is_fatal());
        assert!(DockhandError::Build("exit 1".to_string()).is_fatal());
        assert!(DockhandError::Credential("no version".to_string()).is_fatal());
    }
}
