//! # Vybuild
//!
//! Incremental builds for stages of multi-stage container image recipes.
//!
//! Each stage is a recipe that may build on other local stages. Vybuild
//! works out the dependency order, gives every stage a deterministic tag
//! derived from the build arguments it actually uses, and only invokes the
//! external build tool for stages whose tag is not already present.
//!
//! - **Recipe scanning**: discover stages and the references between them
//! - **Deterministic tags**: `vy__<stage>:<KEY.value...>` or `:latest`
//! - **Build levels**: never build, rebuild requested stages, rebuild all
//! - **Runtime seam**: any docker-compatible CLI, or a fake in tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vybuild::prelude::*;
//!
//! let registry = DirectoryScanner::new().scan(&["./docker".into()])?;
//! let args = BuildArgTable::from_pairs(["PROFILE=release"])?;
//! let orchestrator = Orchestrator::from_config(VybuildConfig::default().with_env_overrides()?);
//!
//! let mut already_built = Vec::new();
//! let summary = orchestrator
//!     .build(&["svc".into()], &registry, &args, &mut already_built, BuildLevel::Requested)
//!     .await?;
//! println!("{summary}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod recipe;
pub mod runtime;
pub mod secrets;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigLoadError, VybuildConfig};
    pub use crate::errors::{
        BuildError, ConfigurationError, CycleDetectedError, RuntimeError, SecretError,
    };
    pub use crate::observability::{init_tracing, SpanTimer};
    pub use crate::pipeline::{
        calculate_tag, check_args, ArgClosure, BuildArgTable, BuildLevel, BuildSummary,
        Orchestrator, TagRecord,
    };
    pub use crate::recipe::{extract_dependencies, RecipeDependencies};
    pub use crate::runtime::{ContainerRuntime, DockerCli, ImageEntry, ImageInventory};
    pub use crate::secrets::{DirectorySecretProvisioner, NoSecrets, SecretProvisioner};
    pub use crate::stages::{DirectoryScanner, RecipeScanner, StageName, StageRecord, StageRegistry};
}
