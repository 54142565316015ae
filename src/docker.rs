//! Registry login and logout through the docker CLI

use crate::credentials::RegistryCredentials;
use crate::error::{DockhandError, DockhandResult};
use crate::process::{CommandRunner, CommandSpec};
use tracing::{debug, info, warn};

/// Parse a `user:password@host` registry login entry.
///
/// The host is taken after the last `@` and the username before the first
/// `:`, so passwords may contain either character.
pub fn parse_registry_login(entry: &str) -> DockhandResult<RegistryCredentials> {
    let invalid =
        || DockhandError::input("registries", "entries must look like user:password@host");

    let (userinfo, host) = entry.rsplit_once('@').ok_or_else(invalid)?;
    let (username, password) = userinfo.split_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }

    Ok(RegistryCredentials {
        registry: host.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// docker CLI operations outside of buildx
pub struct Docker<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Docker<'a> {
    const PROGRAM: &'static str = "docker";

    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Log the docker client and server versions; failures are warnings
    pub async fn version(&self) {
        let spec = CommandSpec::new(Self::PROGRAM, ["version"]);
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => debug!("{}", output.stdout.trim()),
            Ok(output) => warn!("docker version failed: {}", output.failure_detail()),
            Err(e) => warn!("docker version failed: {}", e),
        }
    }

    /// Log into a registry with the password on stdin.
    ///
    /// Returns `false` without running anything when the username or
    /// password is missing.
    pub async fn login(&self, creds: &RegistryCredentials) -> DockhandResult<bool> {
        if !creds.is_complete() {
            debug!("Username or password not set. Skipping login.");
            return Ok(false);
        }

        info!("Logging into {}...", creds.registry);

        let spec = CommandSpec::new(
            Self::PROGRAM,
            [
                "login",
                "--password-stdin",
                "--username",
                creds.username.as_str(),
                creds.registry.as_str(),
            ],
        )
        .with_stdin(creds.password.as_str());

        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(DockhandError::Login {
                registry: creds.registry.clone(),
                reason: output.failure_detail(),
            });
        }

        info!("Login Succeeded!");
        Ok(true)
    }

    /// Log out of a registry
    pub async fn logout(&self, registry: &str) -> DockhandResult<()> {
        let spec = CommandSpec::new(Self::PROGRAM, ["logout", registry]);
        let output = self.runner.run(&spec).await.map_err(|e| DockhandError::Logout {
            registry: registry.to_string(),
            reason: e.to_string(),
        })?;

        if !output.success() {
            return Err(DockhandError::Logout {
                registry: registry.to_string(),
                reason: output.failure_detail(),
            });
        }

        info!("Logged out of {}.", registry);
        Ok(())
    }
}
