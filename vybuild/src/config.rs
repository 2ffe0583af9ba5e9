//! Runtime configuration.

use crate::pipeline::sanitize;
use crate::recipe::{REMOVE_LABEL, TAG_LABEL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`VybuildConfig::runtime_program`].
pub const ENV_RUNTIME: &str = "VYBUILD_RUNTIME";
/// Environment variable overriding [`VybuildConfig::recipe_dir`].
pub const ENV_RECIPE_DIR: &str = "VYBUILD_RECIPE_DIR";
/// Environment variable overriding [`VybuildConfig::prune_after_build`].
pub const ENV_PRUNE: &str = "VYBUILD_PRUNE";

/// Error loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment override has an unusable value.
    #[error("invalid value {value:?} for {variable}")]
    InvalidOverride {
        /// Variable name.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Settings shared by every build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VybuildConfig {
    /// Docker-compatible binary to invoke.
    #[serde(default = "default_runtime_program")]
    pub runtime_program: String,
    /// Directory synthesized recipes are written to.
    #[serde(default = "default_recipe_dir")]
    pub recipe_dir: PathBuf,
    /// Flags appended to every build command.
    #[serde(default)]
    pub extra_build_args: Vec<String>,
    /// Whether intermediate images are pruned after each build.
    #[serde(default = "default_prune_after_build")]
    pub prune_after_build: bool,
    /// Filters selecting images this crate tagged.
    #[serde(default = "default_inventory_filters")]
    pub inventory_filters: Vec<String>,
    /// Filters selecting intermediate images to prune.
    #[serde(default = "default_cleanup_filters")]
    pub cleanup_filters: Vec<String>,
}

fn default_runtime_program() -> String {
    "docker".to_string()
}

fn default_recipe_dir() -> PathBuf {
    std::env::temp_dir().join("vybuild")
}

fn default_prune_after_build() -> bool {
    true
}

fn default_inventory_filters() -> Vec<String> {
    vec![format!("label={TAG_LABEL}")]
}

fn default_cleanup_filters() -> Vec<String> {
    vec![format!("label={REMOVE_LABEL}=1")]
}

impl Default for VybuildConfig {
    fn default() -> Self {
        Self {
            runtime_program: default_runtime_program(),
            recipe_dir: default_recipe_dir(),
            extra_build_args: Vec::new(),
            prune_after_build: default_prune_after_build(),
            inventory_filters: default_inventory_filters(),
            cleanup_filters: default_cleanup_filters(),
        }
    }
}

impl VybuildConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Read`] or [`ConfigLoadError::Parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Applies `VYBUILD_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::InvalidOverride`] for a non-boolean
    /// `VYBUILD_PRUNE`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigLoadError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::InvalidOverride`] for a non-boolean
    /// prune value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(ENV_RUNTIME).filter(|v| !v.is_empty()) {
            self.runtime_program = program;
        }
        if let Some(dir) = lookup(ENV_RECIPE_DIR).filter(|v| !v.is_empty()) {
            self.recipe_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_PRUNE) {
            self.prune_after_build = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigLoadError::InvalidOverride {
                        variable: ENV_PRUNE,
                        value,
                    })
                }
            };
        }
        Ok(self)
    }

    /// Sets the runtime binary.
    #[must_use]
    pub fn with_runtime_program(mut self, program: impl Into<String>) -> Self {
        self.runtime_program = program.into();
        self
    }

    /// Sets the synthesized recipe directory.
    #[must_use]
    pub fn with_recipe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recipe_dir = dir.into();
        self
    }

    /// Adds a flag passed to every build.
    #[must_use]
    pub fn with_extra_build_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_build_args.push(arg.into());
        self
    }

    /// Enables or disables pruning after builds.
    #[must_use]
    pub const fn with_prune_after_build(mut self, prune: bool) -> Self {
        self.prune_after_build = prune;
        self
    }

    /// Path of the synthesized recipe for `tag`.
    #[must_use]
    pub fn recipe_path_for(&self, tag: &str) -> PathBuf {
        self.recipe_dir.join(format!("{}.Dockerfile", sanitize(tag)))
    }
}
