//! Registry classification
//!
//! Maps a repository address to the kind of registry that hosts it. The
//! kind decides how credentials are obtained: ECR registries need a
//! short-lived password from the AWS CLI, everything else uses the
//! configured username and password as-is.
//!
//! | Address | Kind |
//! |---------|------|
//! | `123456789012.dkr.ecr.eu-west-1.amazonaws.com/app` | ECR private |
//! | `public.ecr.aws/org/app` | ECR public |
//! | `ghcr.io/org/app` | custom registry |
//! | `org/app` | Docker Hub |

use crate::config::schema::EcrConfig;
use crate::error::{DockhandError, DockhandResult};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Host prefix of the public ECR gallery
pub const ECR_PUBLIC_HOST: &str = "public.ecr.aws";

/// Region public ECR authenticates against
pub const ECR_PUBLIC_DEFAULT_REGION: &str = "us-east-1";

/// Host `docker login` uses for Docker Hub
pub const DOCKERHUB_HOST: &str = "docker.io";

static ECR_PRIVATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([0-9]{12})\.dkr\.ecr\.([a-z0-9-]+)\.amazonaws\.com(\.cn)?)(/([^:]+)(:.+)?)?$")
        .expect("valid ECR regex")
});

/// The registry a repository address points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registry {
    /// Private ECR: `<account>.dkr.ecr.<region>.amazonaws.com[.cn][/<path>]`
    EcrPrivate {
        host: String,
        account_id: String,
        region: String,
        repo_path: String,
    },
    /// Public ECR gallery
    EcrPublic { repo_path: String },
    /// Docker Hub (no registry host in the address)
    Dockerhub { repo_path: String },
    /// Any other registry, identified by a dotted first segment
    Custom { host: String, repo_path: String },
}

/// Classify a repository address.
///
/// Pure function: no environment, no I/O. The first matching rule wins:
/// private ECR pattern, `public.ecr.aws` prefix, dotted first segment,
/// then Docker Hub.
pub fn classify(repository: &str) -> DockhandResult<Registry> {
    if let Some(caps) = ECR_PRIVATE.captures(repository) {
        return Ok(Registry::EcrPrivate {
            host: caps[1].to_string(),
            account_id: caps[2].to_string(),
            region: caps[3].to_string(),
            repo_path: caps.get(6).map(|m| m.as_str().to_string()).unwrap_or_default(),
        });
    }

    if repository.starts_with(ECR_PUBLIC_HOST) {
        let repo_path = repository
            .strip_prefix(ECR_PUBLIC_HOST)
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();
        return Ok(Registry::EcrPublic { repo_path });
    }

    match repository.chars().next() {
        None => return Err(DockhandError::classification(repository, "address is empty")),
        Some(c) if !(c.is_ascii_alphanumeric() || c == '.' || c == '-') => {
            return Err(DockhandError::classification(
                repository,
                format!(
                    "address must start with a letter, digit, '.' or '-', found {:?}",
                    c
                ),
            ))
        }
        Some(_) => {}
    }

    let (segment, rest) = repository.split_once('/').unwrap_or((repository, ""));
    if segment.contains('.') {
        return Ok(Registry::Custom {
            host: segment.to_string(),
            repo_path: rest.to_string(),
        });
    }

    Ok(Registry::Dockerhub {
        repo_path: repository.to_string(),
    })
}

impl Registry {
    /// Whether credentials come from the AWS CLI
    pub fn is_ecr(&self) -> bool {
        matches!(self, Self::EcrPrivate { .. } | Self::EcrPublic { .. })
    }

    /// Host passed to `docker login` / `docker logout`
    pub fn login_host(&self) -> String {
        match self {
            Self::EcrPrivate { host, .. } => host.clone(),
            Self::EcrPublic { .. } => ECR_PUBLIC_HOST.to_string(),
            Self::Dockerhub { .. } => DOCKERHUB_HOST.to_string(),
            Self::Custom { host, .. } => host.clone(),
        }
    }

    /// Repository path inside the registry
    pub fn repo_path(&self) -> &str {
        match self {
            Self::EcrPrivate { repo_path, .. }
            | Self::EcrPublic { repo_path }
            | Self::Dockerhub { repo_path }
            | Self::Custom { repo_path, .. } => repo_path,
        }
    }

    /// AWS region for ECR registries, `None` otherwise.
    ///
    /// Private ECR carries its region in the address. Public ECR uses
    /// `us-east-1` unless the settings supply an override.
    pub fn region(&self, ecr: &EcrConfig) -> Option<String> {
        match self {
            Self::EcrPrivate { region, .. } => Some(region.clone()),
            Self::EcrPublic { .. } => Some(
                ecr.public_region_override()
                    .unwrap_or_else(|| ECR_PUBLIC_DEFAULT_REGION.to_string()),
            ),
            _ => None,
        }
    }

    /// Short kind name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EcrPrivate { .. } => "ecr-private",
            Self::EcrPublic { .. } => "ecr-public",
            Self::Dockerhub { .. } => "dockerhub",
            Self::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EcrPrivate {
                account_id, region, ..
            } => write!(f, "AWS ECR (account {}, region {})", account_id, region),
            Self::EcrPublic { .. } => write!(f, "AWS Public ECR"),
            Self::Dockerhub { .. } => write!(f, "Docker Hub"),
            Self::Custom { host, .. } => write!(f, "registry {}", host),
        }
    }
}
