//! Registry credential resolution

use crate::config::schema::EcrConfig;
use crate::credentials::aws::{AwsCli, EcrPolicies, EcrService, RepositoryStatus};
use crate::error::DockhandResult;
use crate::inputs::Inputs;
use crate::process::CommandRunner;
use crate::registry::Registry;
use std::fmt;
use tracing::{debug, info};

/// Username ECR expects with a `get-login-password` token
pub const ECR_USERNAME: &str = "AWS";

/// Credentials for one `docker login`
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    /// Host passed to `docker login`
    pub registry: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredentials {
    /// Login is skipped unless both username and password are set
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("registry", &self.registry)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decides how to authenticate against a classified registry
pub struct CredentialResolver<'a> {
    runner: &'a dyn CommandRunner,
    ecr: &'a EcrConfig,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(runner: &'a dyn CommandRunner, ecr: &'a EcrConfig) -> Self {
        Self { runner, ecr }
    }

    /// Resolve login credentials for `registry`.
    ///
    /// ECR registries get a fresh token from the AWS CLI (creating a
    /// missing private repository first); other registries use the
    /// configured username and password unchanged.
    pub async fn resolve(
        &self,
        registry: &Registry,
        inputs: &Inputs,
    ) -> DockhandResult<RegistryCredentials> {
        let Some(region) = registry.region(self.ecr) else {
            debug!("Using configured credentials for {}", registry);
            return Ok(RegistryCredentials {
                registry: registry.login_host(),
                username: inputs.username.clone(),
                password: inputs.password.clone(),
            });
        };

        let aws = AwsCli::new(self.runner);
        let version = aws.version().await?;

        let service = match registry {
            Registry::EcrPrivate { repo_path, .. } => {
                info!("AWS ECR detected with {} region", region);
                if repo_path.is_empty() {
                    debug!("No repository path in address, skipping repository check");
                } else {
                    info!("Checking if repository exists through AWS CLI {}...", version);
                    let policies = EcrPolicies::load(self.ecr)?;
                    if aws.ensure_repository(repo_path, &region, &policies).await?
                        == RepositoryStatus::Created
                    {
                        info!("Created ECR repository {}", repo_path);
                    }
                }
                EcrService::Private
            }
            _ => {
                info!("AWS Public ECR detected with {} region", region);
                EcrService::Public
            }
        };

        info!("Retrieving docker login password through AWS CLI {}...", version);
        let password = aws.login_password(service, &region).await?;

        Ok(RegistryCredentials {
            registry: registry.login_host(),
            username: ECR_USERNAME.to_string(),
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DockhandError;
    use crate::process::scripted::ScriptedRunner;
    use crate::registry::classify;

    fn inputs() -> Inputs {
        Inputs {
            repository: "unused".to_string(),
            username: "robot".to_string(),
            password: "hunter2".to_string(),
            ..Default::default()
        }
    }

    fn aws_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .respond("aws", &["--version"], 0, "aws-cli/2.15.30 Python/3.11.8", "")
            .respond("aws", &["ecr", "get-login-password"], 0, "private-token\n", "")
            .respond("aws", &["ecr-public", "get-login-password"], 0, "public-token\n", "")
    }

    #[tokio::test]
    async fn custom_registry_passes_credentials_through() {
        let runner = ScriptedRunner::new();
        let ecr = EcrConfig::default();
        let registry = classify("ghcr.io/org/app").unwrap();

        let creds = CredentialResolver::new(&runner, &ecr)
            .resolve(&registry, &inputs())
            .await
            .unwrap();

        assert_eq!(creds.registry, "ghcr.io");
        assert_eq!(creds.username, "robot");
        assert_eq!(creds.password, "hunter2");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn dockerhub_logs_into_docker_io() {
        let runner = ScriptedRunner::new();
        let ecr = EcrConfig::default();
        let registry = classify("org/app").unwrap();

        let creds = CredentialResolver::new(&runner, &ecr)
            .resolve(&registry, &inputs())
            .await
            .unwrap();
        assert_eq!(creds.registry, "docker.io");
    }

    #[tokio::test]
    async fn private_ecr_checks_repository_then_fetches_token() {
        let runner = aws_runner();
        let ecr = EcrConfig::default();
        let registry = classify("123456789012.dkr.ecr.eu-west-1.amazonaws.com/team/app").unwrap();

        let creds = CredentialResolver::new(&runner, &ecr)
            .resolve(&registry, &inputs())
            .await
            .unwrap();

        assert_eq!(creds.username, "AWS");
        assert_eq!(creds.password, "private-token");
        assert_eq!(creds.registry, "123456789012.dkr.ecr.eu-west-1.amazonaws.com");
        assert_eq!(
            runner.command_lines(),
            vec![
                "aws --version",
                "aws ecr describe-repositories --region eu-west-1 --repository-names team/app",
                "aws ecr get-login-password --region eu-west-1",
            ]
        );
    }

    #[tokio::test]
    async fn public_ecr_skips_repository_check() {
        let runner = aws_runner();
        let ecr = EcrConfig::default();
        let registry = classify("public.ecr.aws/org/app").unwrap();

        let creds = CredentialResolver::new(&runner, &ecr)
            .resolve(&registry, &inputs())
            .await
            .unwrap();

        assert_eq!(creds.username, "AWS");
        assert_eq!(creds.password, "public-token");
        assert!(!runner.was_called("aws ecr describe-repositories"));
        assert!(runner.was_called("aws ecr-public get-login-password --region us-east-1"));
    }

    #[tokio::test]
    async fn unparsable_cli_version_is_fatal() {
        let runner = ScriptedRunner::new().respond("aws", &["--version"], 0, "garbage", "");
        let ecr = EcrConfig::default();
        let registry = classify("public.ecr.aws/org/app").unwrap();

        let err = CredentialResolver::new(&runner, &ecr)
            .resolve(&registry, &inputs())
            .await
            .unwrap_err();

        assert!(matches!(err, DockhandError::Credential(_)));
        assert!(err.is_fatal());
        assert!(!runner.was_called("aws ecr-public"));
    }

    #[test]
    fn debug_redacts_password() {
        let creds = RegistryCredentials {
            registry: "ghcr.io".to_string(),
            username: "robot".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
