//! The container runtime seam.
//!
//! The orchestrator only ever needs four things from a runtime: run a build,
//! read back an image id by tag, list images, and prune images by label.
//! [`DockerCli`] implements them on top of any docker-compatible binary.

mod cleanup;
mod docker;
mod inventory;

pub use cleanup::CleanupSweeper;
pub use docker::DockerCli;
pub use inventory::{existing_tags, ImageInventory};

use crate::errors::RuntimeError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A container runtime driven through its command-line interface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Runs one image build and waits for it to finish.
    async fn build(&self, invocation: &BuildInvocation) -> Result<(), RuntimeError>;

    /// Returns the id of the image tagged `tag`.
    async fn image_id(&self, tag: &str) -> Result<String, RuntimeError>;

    /// Lists images matching all `filters` (runtime filter syntax).
    async fn list_images(&self, filters: &[String]) -> Result<Vec<ImageEntry>, RuntimeError>;

    /// Removes dangling images matching all `filters`.
    async fn prune(&self, filters: &[String]) -> Result<(), RuntimeError>;
}

/// One external build command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    /// Tag given to the resulting image.
    pub tag: String,
    /// The synthesized recipe file.
    pub recipe_path: PathBuf,
    /// Build context directory.
    pub context: PathBuf,
    /// One `--build-arg` per entry.
    pub build_args: Vec<(String, String)>,
    /// Extra flags (secret mounts, configured flags) placed before the context.
    pub extra_args: Vec<String>,
}

impl BuildInvocation {
    /// Creates an invocation without build args or extra flags.
    #[must_use]
    pub fn new(tag: impl Into<String>, recipe_path: impl Into<PathBuf>, context: impl Into<PathBuf>) -> Self {
        Self {
            tag: tag.into(),
            recipe_path: recipe_path.into(),
            context: context.into(),
            build_args: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    /// Sets the build args.
    #[must_use]
    pub fn with_build_args(mut self, args: Vec<(String, String)>) -> Self {
        self.build_args = args;
        self
    }

    /// Appends extra flags.
    #[must_use]
    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// The argument vector after the program name.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--file".to_string(),
            self.recipe_path.display().to_string(),
            "--tag".to_string(),
            self.tag.clone(),
        ];
        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{key}={value}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(self.context.display().to_string());
        args
    }
}

/// One image known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Creation time, if the runtime reported a parseable one.
    pub created_at: Option<DateTime<FixedOffset>>,
    /// Image id.
    pub image_id: String,
    /// Repository part of the reference.
    pub repository: String,
    /// Tag part of the reference.
    pub tag: String,
}

impl ImageEntry {
    /// The `repository:tag` reference.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// Returns true for untagged (`<none>`) images.
    #[must_use]
    pub fn is_dangling(&self) -> bool {
        self.repository == "<none>" || self.tag == "<none>"
    }
}
