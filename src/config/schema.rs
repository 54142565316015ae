//! Configuration schema for Dockhand
//!
//! Tool settings are stored at `~/.config/dockhand/config.toml`. They tune
//! how the pipeline runs on a given runner; per-job inputs live in
//! [`crate::inputs::Inputs`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Build cache settings
    pub cache: CacheConfig,

    /// AWS ECR settings
    pub ecr: EcrConfig,

    /// Buildx builder settings
    pub builder: BuilderConfig,

    /// Job state settings
    pub state: StateConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Build cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory buildx reads the previous cache from
    pub path: PathBuf,

    /// Directory buildx writes the new cache to
    pub new_path: PathBuf,

    /// Directory holding saved cache archives
    pub store_dir: PathBuf,

    /// Archives kept per key prefix; older ones are removed on save
    pub keep: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/.buildx-cache"),
            new_path: PathBuf::from("/tmp/.buildx-cache-new"),
            store_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("dockhand")
                .join("buildx-cache"),
            keep: 3,
        }
    }
}

/// AWS ECR settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EcrConfig {
    /// Region used for public ECR (default: us-east-1)
    pub public_region: Option<String>,

    /// Take the public ECR region from AWS_REGION / AWS_DEFAULT_REGION
    pub region_from_env: bool,

    /// Replacement repository policy document for new repositories
    pub repository_policy_file: Option<PathBuf>,

    /// Replacement lifecycle policy document for new repositories
    pub lifecycle_policy_file: Option<PathBuf>,
}

impl EcrConfig {
    /// Configured public ECR region, if any
    pub fn public_region_override(&self) -> Option<String> {
        if let Some(region) = &self.public_region {
            return Some(region.clone());
        }
        if !self.region_from_env {
            return None;
        }
        ["AWS_REGION", "AWS_DEFAULT_REGION"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|region| !region.is_empty())
    }
}

/// Buildx builder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Buildx driver for new builders
    pub driver: String,

    /// Docker context new builders are bound to
    pub context: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            driver: "docker-container".to_string(),
            context: "builders".to_string(),
        }
    }
}

/// Job state settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// State file used outside GitHub Actions
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[builder]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.builder.context, "builders");
        assert_eq!(config.cache.path, PathBuf::from("/tmp/.buildx-cache"));
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [ecr]
            public_region = "eu-west-1"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ecr.public_region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.builder.driver, "docker-container"); // default preserved
    }

    #[test]
    #[serial]
    fn public_region_from_env_only_when_enabled() {
        std::env::set_var("AWS_REGION", "ap-south-1");

        let disabled = EcrConfig::default();
        assert_eq!(disabled.public_region_override(), None);

        let enabled = EcrConfig {
            region_from_env: true,
            ..Default::default()
        };
        assert_eq!(enabled.public_region_override().as_deref(), Some("ap-south-1"));

        std::env::remove_var("AWS_REGION");
    }
}
