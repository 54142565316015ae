//! Two-phase job controller
//!
//! The host runs the binary twice per job. The first run (main) logs in,
//! restores the cache, prepares a builder and builds; the second run (post)
//! saves the cache, logs out and removes the builder. Which run this is comes
//! from the `isPost` state key, written before main does anything the post
//! run would have to undo.

use crate::build::{self, BuildPlan, CiEvent, DerivedTags};
use crate::builder::BuilderManager;
use crate::cache::{CacheKey, CacheManager, CacheStore};
use crate::config::schema::Config;
use crate::credentials::CredentialResolver;
use crate::docker::{parse_registry_login, Docker};
use crate::error::{DockhandError, DockhandResult};
use crate::git;
use crate::inputs::Inputs;
use crate::outputs::{names, OutputSink};
use crate::process::CommandRunner;
use crate::qemu;
use crate::registry;
use crate::state::{JobState, StateStore};
use crate::ui::{self, UiContext};
use std::fmt;
use tracing::{debug, info, warn};

/// Which invocation of the job this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Main,
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// External collaborators the controller drives
pub struct Services<'a> {
    pub runner: &'a dyn CommandRunner,
    pub state: &'a dyn StateStore,
    pub cache: &'a dyn CacheStore,
    pub outputs: &'a dyn OutputSink,
}

/// Runs the main or post phase of a job
pub struct Controller<'a> {
    inputs: Inputs,
    config: &'a Config,
    services: Services<'a>,
    ui: UiContext,
    event: Option<CiEvent>,
}

impl<'a> Controller<'a> {
    pub fn new(
        inputs: Inputs,
        config: &'a Config,
        services: Services<'a>,
        ui: UiContext,
    ) -> Self {
        Self {
            inputs,
            config,
            services,
            ui,
            event: None,
        }
    }

    /// Use `event` instead of reading the CI event from the environment
    pub fn with_event(mut self, event: CiEvent) -> Self {
        self.event = Some(event);
        self
    }

    /// Run whichever phase is due.
    ///
    /// Main aborts at the first fatal error. Post never fails on cleanup;
    /// each step is attempted and problems are reported as warnings.
    pub async fn run(&self) -> DockhandResult<Phase> {
        let state = JobState::new(self.services.state);

        if state.is_post().await? {
            debug!("Job state marks this as the post invocation");
            self.post(&state).await;
            return Ok(Phase::Post);
        }

        state.mark_post().await?;
        self.main(&state).await?;
        Ok(Phase::Main)
    }

    async fn main(&self, state: &JobState<'_>) -> DockhandResult<()> {
        self.inputs.validate()?;

        let runner = self.services.runner;
        let docker = Docker::new(runner);
        docker.version().await;

        let registry = registry::classify(&self.inputs.repository)?;
        info!("Registry: {}", registry);

        {
            let _group = ui::group(&self.ui, "Logging in");

            for entry in &self.inputs.registries {
                let creds = parse_registry_login(entry)?;
                debug!("Extra registry {} as {}", creds.registry, creds.username);
                if docker.login(&creds).await? {
                    state.add_extra_registry(&creds.registry).await?;
                }
            }

            let creds = CredentialResolver::new(runner, &self.config.ecr)
                .resolve(&registry, &self.inputs)
                .await?;
            if docker.login(&creds).await? {
                state.set_registry(&creds.registry).await?;
            }
        }

        if self.inputs.auth_only {
            info!("Auth only, skipping build");
            return Ok(());
        }

        if self.inputs.qemu {
            qemu::setup(runner, &self.ui, &registry.login_host()).await;
        }

        let sha = if self.inputs.cache || !self.inputs.skip_default_tag {
            Some(git::head_sha(runner).await?)
        } else {
            None
        };

        if let Some(sha) = sha.as_deref().filter(|_| self.inputs.cache) {
            let key = CacheKey::new(&self.inputs.cache_key, sha);
            let cache = CacheManager::new(self.services.cache, &self.config.cache, &self.ui);
            self.tolerate(cache.restore(&key, state).await)?;
        }

        let builder = BuilderManager::new(runner, &self.config.builder, &self.ui)
            .ensure(self.inputs.builder.as_deref(), state)
            .await?;
        self.services.outputs.set(names::BUILDER, &builder)?;

        let prefix = if self.inputs.wants_prefixed_tag() {
            Some(self.tag_prefix()?)
        } else {
            None
        };
        let tags = DerivedTags::derive(&self.inputs, sha.as_deref(), prefix.as_ref())?;
        let plan = BuildPlan::assemble(&self.inputs, &tags, &self.config.cache)?;

        let image = {
            let _group = ui::group(&self.ui, "Starting build");
            build::run(runner, &plan).await?
        };

        if self.inputs.push {
            let _group = ui::group(&self.ui, "Pushed image");
            build::inspect(runner, &image).await?;
        }

        self.services.outputs.set(names::IMAGE, &image)?;
        Ok(())
    }

    fn tag_prefix(&self) -> DockhandResult<build::TagPrefix> {
        let from_env;
        let event = match &self.event {
            Some(event) => event,
            None => {
                from_env = CiEvent::from_env()?;
                &from_env
            }
        };

        let prefix = event.tag_prefix(self.inputs.default_branch.as_deref())?;
        debug!("Tag prefix {} from {} event", prefix, event.name());
        Ok(prefix)
    }

    async fn post(&self, state: &JobState<'_>) {
        let runner = self.services.runner;

        if self.inputs.cache {
            let cache = CacheManager::new(self.services.cache, &self.config.cache, &self.ui);
            if let Err(e) = cache.save(state).await {
                self.report_warning(&e);
            }
        }

        let registry = self.read_or_default(state.registry().await);
        let extra = self.read_or_default(state.extra_registries().await);
        if !registry.is_empty() || !extra.is_empty() {
            let _group = ui::group(&self.ui, "Logging out");
            let docker = Docker::new(runner);
            for host in std::iter::once(registry).filter(|r| !r.is_empty()).chain(extra) {
                if let Err(e) = docker.logout(&host).await {
                    self.report_warning(&e);
                }
            }
        }

        let builder = self.read_or_default(state.builder_name().await);
        if let Err(e) = BuilderManager::new(runner, &self.config.builder, &self.ui)
            .stop(&builder)
            .await
        {
            self.report_warning(&e);
        }

        if let Err(e) = state.clear().await {
            self.report_warning(&e);
        }
    }

    fn read_or_default<T: Default>(&self, value: DockhandResult<T>) -> T {
        value.unwrap_or_else(|e| {
            self.report_warning(&e);
            T::default()
        })
    }

    /// Downgrade a non-fatal error to a warning
    fn tolerate(&self, result: DockhandResult<()>) -> DockhandResult<()> {
        match result {
            Err(e) if !e.is_fatal() => {
                self.report_warning(&e);
                Ok(())
            }
            other => other,
        }
    }

    fn report_warning(&self, e: &DockhandError) {
        warn!("{}", e);
        ui::warning(&self.ui, &e.to_string());
    }
}
