//! AWS ECR access through the AWS CLI

use crate::config::schema::EcrConfig;
use crate::error::{DockhandError, DockhandResult};
use crate::process::{CommandRunner, CommandSpec};
use regex::Regex;
use semver::Version;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

const REPOSITORY_POLICY: &str = include_str!("../../resources/ecr-repository-policy.json");
const LIFECYCLE_POLICY: &str = include_str!("../../resources/ecr-lifecycle-policy.json");

/// Exit code the AWS CLI uses when describe-repositories finds nothing
const REPOSITORY_NOT_FOUND_EXIT: i32 = 254;

static CLI_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"aws-cli/([0-9.]+)").expect("valid aws-cli version regex"));

/// ECR API flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcrService {
    Private,
    Public,
}

impl EcrService {
    /// CLI sub-command for this service
    pub fn command(&self) -> &'static str {
        match self {
            Self::Private => "ecr",
            Self::Public => "ecr-public",
        }
    }
}

/// Outcome of making sure a private repository exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryStatus {
    Existing,
    Created,
}

/// Policy documents attached to newly created repositories
#[derive(Debug, Clone)]
pub struct EcrPolicies {
    /// Repository (access) policy, compact JSON
    pub repository: String,
    /// Lifecycle policy, compact JSON
    pub lifecycle: String,
}

impl EcrPolicies {
    /// Built-in policies, or the replacements named in the settings
    pub fn load(config: &EcrConfig) -> DockhandResult<Self> {
        let repository = match &config.repository_policy_file {
            Some(path) => read_policy(path)?,
            None => REPOSITORY_POLICY.to_string(),
        };
        let lifecycle = match &config.lifecycle_policy_file {
            Some(path) => read_policy(path)?,
            None => LIFECYCLE_POLICY.to_string(),
        };

        Ok(Self {
            repository: compact_json(&repository)?,
            lifecycle: compact_json(&lifecycle)?,
        })
    }
}

fn read_policy(path: &Path) -> DockhandResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| DockhandError::io(format!("reading ECR policy {}", path.display()), e))
}

fn compact_json(document: &str) -> DockhandResult<String> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    Ok(serde_json::to_string(&value)?)
}

/// Parse the version out of `aws --version` output.
///
/// Missing minor or patch components are treated as zero.
pub fn parse_cli_version(output: &str) -> DockhandResult<Version> {
    let raw = CLI_VERSION
        .captures(output)
        .map(|caps| caps[1].trim_matches('.').to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DockhandError::Credential("Cannot parse AWS CLI version".to_string()))?;

    let mut parts: Vec<&str> = raw.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&parts[..3].join(".")).map_err(|e| {
        DockhandError::Credential(format!("Cannot semver parse AWS CLI version {}: {}", raw, e))
    })
}

/// Thin wrapper over the `aws` binary
pub struct AwsCli<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> AwsCli<'a> {
    const PROGRAM: &'static str = "aws";

    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Run the CLI and return its trimmed output.
    ///
    /// Some CLI versions print to stderr on success (v1 `--version`), so
    /// stderr is returned when stdout is empty.
    async fn exec(&self, args: Vec<String>) -> DockhandResult<String> {
        let spec = CommandSpec::new(Self::PROGRAM, args);
        let output = self.runner.run(&spec).await?.check(&spec)?;

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(output.stderr.trim().to_string());
        }
        Ok(stdout.to_string())
    }

    /// Installed CLI version
    pub async fn version(&self) -> DockhandResult<Version> {
        let output = self
            .exec(vec!["--version".to_string()])
            .await
            .map_err(|e| DockhandError::Credential(e.to_string()))?;
        parse_cli_version(&output)
    }

    /// Make sure a private repository exists, creating it when missing.
    ///
    /// A new repository gets the repository policy and lifecycle policy
    /// attached in that order. Nothing is rolled back when a later step
    /// fails, so a failure can leave a repository without policies.
    pub async fn ensure_repository(
        &self,
        repo_path: &str,
        region: &str,
        policies: &EcrPolicies,
    ) -> DockhandResult<RepositoryStatus> {
        let provision_err = |e: DockhandError| DockhandError::RepositoryProvision {
            repository: repo_path.to_string(),
            reason: e.to_string(),
        };

        let describe = CommandSpec::new(
            Self::PROGRAM,
            [
                "ecr",
                "describe-repositories",
                "--region",
                region,
                "--repository-names",
                repo_path,
            ],
        );
        let output = self.runner.run(&describe).await.map_err(provision_err)?;

        match output.code {
            Some(0) => {
                debug!("ECR repository {} exists", repo_path);
                return Ok(RepositoryStatus::Existing);
            }
            Some(REPOSITORY_NOT_FOUND_EXIT) => {}
            _ => {
                return Err(DockhandError::RepositoryProvision {
                    repository: repo_path.to_string(),
                    reason: output.failure_detail(),
                })
            }
        }

        info!("{} does not exist, creating...", repo_path);
        let base = |cmd: &str| {
            vec![
                "ecr".to_string(),
                cmd.to_string(),
                "--region".to_string(),
                region.to_string(),
                "--repository-name".to_string(),
                repo_path.to_string(),
            ]
        };

        self.exec(base("create-repository"))
            .await
            .map_err(provision_err)?;

        let mut args = base("set-repository-policy");
        args.extend(["--policy-text".to_string(), policies.repository.clone()]);
        self.exec(args).await.map_err(provision_err)?;

        let mut args = base("put-lifecycle-policy");
        args.extend([
            "--lifecycle-policy-text".to_string(),
            policies.lifecycle.clone(),
        ]);
        self.exec(args).await.map_err(provision_err)?;

        Ok(RepositoryStatus::Created)
    }

    /// Short-lived password for `docker login`
    pub async fn login_password(
        &self,
        service: EcrService,
        region: &str,
    ) -> DockhandResult<String> {
        let password = self
            .exec(vec![
                service.command().to_string(),
                "get-login-password".to_string(),
                "--region".to_string(),
                region.to_string(),
            ])
            .await
            .map_err(|e| DockhandError::Credential(e.to_string()))?;

        if password.is_empty() {
            return Err(DockhandError::Credential(format!(
                "{} get-login-password returned an empty password",
                service.command()
            )));
        }
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::scripted::ScriptedRunner;

    #[test]
    fn parse_v2_version() {
        let version =
            parse_cli_version("aws-cli/2.15.30 Python/3.11.8 Linux/6.5.0 exe/x86_64.ubuntu.22")
                .unwrap();
        assert_eq!(version, Version::new(2, 15, 30));
    }

    #[test]
    fn parse_short_version() {
        let version = parse_cli_version("aws-cli/1.18 Python/2.7.18").unwrap();
        assert_eq!(version, Version::new(1, 18, 0));
    }

    #[test]
    fn unparsable_version_is_credential_error() {
        let err = parse_cli_version("command not found").unwrap_err();
        assert!(matches!(err, DockhandError::Credential(_)));
    }

    #[test]
    fn builtin_policies_are_compact_json() {
        let policies = EcrPolicies::load(&EcrConfig::default()).unwrap();
        assert!(!policies.repository.contains('\n'));
        assert!(policies.lifecycle.contains("\"rulePriority\":1"));
    }

    #[test]
    fn policy_file_override() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("lifecycle.json");
        std::fs::write(&path, "{ \"rules\": [] }").unwrap();

        let config = EcrConfig {
            lifecycle_policy_file: Some(path),
            ..Default::default()
        };
        let policies = EcrPolicies::load(&config).unwrap();
        assert_eq!(policies.lifecycle, "{\"rules\":[]}");
    }

    #[tokio::test]
    async fn version_reads_stderr_when_stdout_empty() {
        let runner = ScriptedRunner::new().respond(
            "aws",
            &["--version"],
            0,
            "",
            "aws-cli/1.22.34 Python/3.10.12",
        );
        let version = AwsCli::new(&runner).version().await.unwrap();
        assert_eq!(version, Version::new(1, 22, 34));
    }

    #[tokio::test]
    async fn existing_repository_is_left_alone() {
        let runner = ScriptedRunner::new();
        let policies = EcrPolicies::load(&EcrConfig::default()).unwrap();

        let status = AwsCli::new(&runner)
            .ensure_repository("team/app", "eu-west-1", &policies)
            .await
            .unwrap();

        assert_eq!(status, RepositoryStatus::Existing);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_repository_is_created_with_policies() {
        let runner = ScriptedRunner::new().respond(
            "aws",
            &["ecr", "describe-repositories"],
            254,
            "",
            "RepositoryNotFoundException",
        );
        let policies = EcrPolicies::load(&EcrConfig::default()).unwrap();

        let status = AwsCli::new(&runner)
            .ensure_repository("team/app", "eu-west-1", &policies)
            .await
            .unwrap();

        assert_eq!(status, RepositoryStatus::Created);
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 4);
        let create = "aws ecr create-repository --region eu-west-1 --repository-name team/app";
        assert!(lines[1].starts_with(create));
        assert!(lines[2].starts_with("aws ecr set-repository-policy"));
        assert!(lines[3].starts_with("aws ecr put-lifecycle-policy"));
    }

    #[tokio::test]
    async fn failed_policy_step_is_not_rolled_back() {
        let runner = ScriptedRunner::new()
            .respond("aws", &["ecr", "describe-repositories"], 254, "", "not found")
            .respond("aws", &["ecr", "set-repository-policy"], 255, "", "AccessDenied");
        let policies = EcrPolicies::load(&EcrConfig::default()).unwrap();

        let err = AwsCli::new(&runner)
            .ensure_repository("team/app", "eu-west-1", &policies)
            .await
            .unwrap_err();

        assert!(matches!(err, DockhandError::RepositoryProvision { .. }));
        assert!(err.to_string().contains("AccessDenied"));
        assert!(runner.was_called("aws ecr create-repository"));
        assert!(!runner.was_called("aws ecr put-lifecycle-policy"));
        assert!(!runner.was_called("aws ecr delete-repository"));
    }

    #[tokio::test]
    async fn describe_failure_is_provision_error() {
        let runner = ScriptedRunner::new().respond(
            "aws",
            &["ecr", "describe-repositories"],
            255,
            "",
            "ExpiredToken",
        );
        let policies = EcrPolicies::load(&EcrConfig::default()).unwrap();

        let err = AwsCli::new(&runner)
            .ensure_repository("team/app", "eu-west-1", &policies)
            .await
            .unwrap_err();
        assert!(matches!(err, DockhandError::RepositoryProvision { .. }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn public_login_password_uses_ecr_public() {
        let runner = ScriptedRunner::new().respond(
            "aws",
            &["ecr-public", "get-login-password"],
            0,
            "s3cr3t\n",
            "",
        );
        let password = AwsCli::new(&runner)
            .login_password(EcrService::Public, "us-east-1")
            .await
            .unwrap();

        assert_eq!(password, "s3cr3t");
        assert_eq!(
            runner.command_lines(),
            vec!["aws ecr-public get-login-password --region us-east-1"]
        );
    }
}
