//! Build graph orchestration.
//!
//! [`Orchestrator::build`] resolves the requested stages depth-first,
//! computing each stage's tag after its dependencies and deciding whether the
//! stage must be built or can reuse an existing image. Builds are issued one
//! at a time, dependencies strictly before dependents, and the first failure
//! aborts the run.

use super::{calculate_tag, check_args, ArgClosure, BuildArgTable, BuildLevel, BuildSummary, TagRecord};
use crate::config::VybuildConfig;
use crate::errors::{BuildError, ConfigurationError, CycleDetectedError};
use crate::observability::SpanTimer;
use crate::recipe::{synthesize, SynthesisInput};
use crate::runtime::{BuildInvocation, CleanupSweeper, ContainerRuntime, DockerCli, ImageInventory};
use crate::secrets::{NoSecrets, SecretProvisioner};
use crate::stages::{StageName, StageRecord, StageRegistry};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives image builds for a stage registry.
pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    secrets: Arc<dyn SecretProvisioner>,
    config: VybuildConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over `runtime` with default configuration and
    /// no secrets.
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            secrets: Arc::new(NoSecrets),
            config: VybuildConfig::default(),
        }
    }

    /// Creates an orchestrator driving the configured runtime binary.
    #[must_use]
    pub fn from_config(config: VybuildConfig) -> Self {
        let runtime = Arc::new(DockerCli::new(config.runtime_program.clone()));
        Self::new(runtime).with_config(config)
    }

    /// Sets the secret provisioner.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProvisioner>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: VybuildConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &VybuildConfig {
        &self.config
    }

    /// Builds `requested` and everything they depend on.
    ///
    /// Tags of images built by this call are appended to `already_built`;
    /// a tag already present there is never built again, so sharing the
    /// vector across calls makes repeated builds free.
    ///
    /// Every requested stage is looked up and every argument the requested
    /// closure needs is checked before anything is spawned.
    ///
    /// # Errors
    ///
    /// Returns the first failure: a [`BuildError::Configuration`] for an
    /// unknown stage, missing arguments or a dependency cycle, or the
    /// secret, build or inspection failure of the stage that failed.
    /// Images built before the failure are kept.
    pub async fn build(
        &self,
        requested: &[StageName],
        registry: &StageRegistry,
        args: &BuildArgTable,
        already_built: &mut Vec<String>,
        level: BuildLevel,
    ) -> Result<BuildSummary, BuildError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("build", run_id = %run_id, level = %level);
        self.run(run_id, requested, registry, args, already_built, level)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        run_id: Uuid,
        requested: &[StageName],
        registry: &StageRegistry,
        args: &BuildArgTable,
        already_built: &mut Vec<String>,
        level: BuildLevel,
    ) -> Result<BuildSummary, BuildError> {
        let timer = SpanTimer::start("build");

        for name in requested {
            registry.lookup(name)?;
        }
        check_args(requested, registry, args)?;

        let mut session = BuildSession {
            orchestrator: self,
            registry,
            args,
            level,
            requested: requested.iter().cloned().collect(),
            already_built,
            records: HashMap::new(),
            order: Vec::new(),
            in_progress: Vec::new(),
            inventory: None,
            builds_issued: 0,
        };

        let mut outcome = Ok(());
        for name in requested {
            if let Err(e) = session.resolve(name).await {
                outcome = Err(e);
                break;
            }
        }

        let summary = session.into_summary(run_id, timer.finish());
        for record in &summary.records {
            info!(stage = %record.stage_name, tag = %record.tag, "{record}");
        }
        match outcome {
            Ok(()) => {
                info!(
                    built = summary.built().count(),
                    skipped = summary.skipped().count(),
                    duration_ms = summary.duration_ms,
                    "Build finished"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "Build aborted");
                Err(e)
            }
        }
    }
}

/// State of one `build` call.
struct BuildSession<'a> {
    orchestrator: &'a Orchestrator,
    registry: &'a StageRegistry,
    args: &'a BuildArgTable,
    level: BuildLevel,
    requested: HashSet<StageName>,
    already_built: &'a mut Vec<String>,
    records: HashMap<StageName, TagRecord>,
    order: Vec<StageName>,
    in_progress: Vec<StageName>,
    inventory: Option<ImageInventory>,
    builds_issued: usize,
}

impl<'a> BuildSession<'a> {
    /// Resolves `name` after its dependencies and returns its argument closure.
    fn resolve<'s>(
        &'s mut self,
        name: &'s StageName,
    ) -> BoxFuture<'s, Result<ArgClosure, BuildError>> {
        self.resolve_stage(name).boxed()
    }

    async fn resolve_stage(&mut self, name: &StageName) -> Result<ArgClosure, BuildError> {
        if let Some(record) = self.records.get(name) {
            return Ok(record.args.clone());
        }
        if let Some(start) = self.in_progress.iter().position(|n| n == name) {
            let mut path: Vec<String> =
                self.in_progress[start..].iter().map(ToString::to_string).collect();
            path.push(name.to_string());
            return Err(ConfigurationError::from(CycleDetectedError::new(path)).into());
        }

        let registry = self.registry;
        let stage = registry.lookup(name)?;
        self.in_progress.push(stage.name().clone());

        let mut closure = ArgClosure::from_record(stage);
        for dep in stage.depends_on() {
            let dep_closure = self.resolve(dep).await?;
            closure.merge(&dep_closure);
        }

        let tag = calculate_tag(stage.name(), closure.keys(), self.args);
        let mut record = TagRecord::new(stage.name().clone(), tag.clone(), closure.clone());

        if self.should_build(stage.name(), &tag).await? {
            record.built_image_hash = Some(self.build_stage(stage, &tag, &closure).await?);
        } else {
            info!(stage = %stage.name(), tag = %tag, "Skipping stage (cache hit)");
            record.skipped = true;
        }

        self.in_progress.pop();
        self.order.push(stage.name().clone());
        self.records.insert(stage.name().clone(), record);
        Ok(closure)
    }

    async fn should_build(&mut self, name: &StageName, tag: &str) -> Result<bool, BuildError> {
        let forced = match self.level {
            BuildLevel::Never => return Ok(false),
            BuildLevel::All => true,
            BuildLevel::Requested => self.requested.contains(name),
        };
        if self.already_built.iter().any(|t| t == tag) {
            return Ok(false);
        }
        if forced {
            return Ok(true);
        }
        Ok(!self.inventory().await?.contains(tag))
    }

    async fn inventory(&mut self) -> Result<&ImageInventory, BuildError> {
        if self.inventory.is_none() {
            let config = &self.orchestrator.config;
            let loaded =
                ImageInventory::load(self.orchestrator.runtime.as_ref(), &config.inventory_filters)
                    .await?;
            self.inventory = Some(loaded);
        }
        Ok(self.inventory.get_or_insert_with(ImageInventory::default))
    }

    async fn build_stage(
        &mut self,
        stage: &StageRecord,
        tag: &str,
        closure: &ArgClosure,
    ) -> Result<String, BuildError> {
        let name = stage.name();
        let missing = closure.missing(self.args);
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingArguments { keys: missing }.into());
        }

        info!(stage = %name, tag = %tag, "Building stage");

        let secret_flags = self
            .orchestrator
            .secrets
            .provision(name, stage.secrets())
            .map_err(|source| BuildError::SecretProvisioning {
                stage: name.to_string(),
                source,
            })?;

        let dependencies: Vec<(StageName, String)> = stage
            .depends_on()
            .iter()
            .filter_map(|dep| self.records.get(dep).map(|r| (dep.clone(), r.tag.clone())))
            .collect();
        let relevant = closure.relevant(self.args);
        let recipe = synthesize(&SynthesisInput {
            stage,
            tag,
            args: &relevant,
            dependencies: &dependencies,
        });

        let config = &self.orchestrator.config;
        let recipe_path = config.recipe_path_for(tag);
        tokio::fs::create_dir_all(&config.recipe_dir).await?;
        tokio::fs::write(&recipe_path, recipe).await?;

        let invocation = BuildInvocation::new(tag, recipe_path, stage.build_context())
            .with_build_args(relevant)
            .with_extra_args(config.extra_build_args.iter().cloned())
            .with_extra_args(secret_flags);

        let runtime = self.orchestrator.runtime.as_ref();
        self.builds_issued += 1;
        if let Err(source) = runtime.build(&invocation).await {
            error!(stage = %name, tag = %tag, error = %source, "Failed stage as {tag}");
            return Err(BuildError::ExternalBuild {
                stage: name.to_string(),
                tag: tag.to_string(),
                source,
            });
        }
        self.already_built.push(tag.to_string());

        let image_id = runtime.image_id(tag).await;
        if config.prune_after_build {
            CleanupSweeper::new(config.cleanup_filters.clone())
                .sweep_logged(runtime)
                .await;
        }

        match image_id {
            Ok(image_id) => {
                info!(stage = %name, tag = %tag, image_id = %image_id, "Built stage as {tag}");
                Ok(image_id)
            }
            Err(source) => {
                warn!(stage = %name, tag = %tag, error = %source, "Built image could not be inspected");
                Err(BuildError::ExternalInspection {
                    stage: name.to_string(),
                    tag: tag.to_string(),
                    source,
                })
            }
        }
    }

    fn into_summary(mut self, run_id: Uuid, duration_ms: f64) -> BuildSummary {
        let records = self
            .order
            .iter()
            .filter_map(|name| self.records.remove(name))
            .collect();
        BuildSummary {
            run_id,
            level: self.level,
            records,
            builds_issued: self.builds_issued,
            duration_ms,
        }
    }
}
