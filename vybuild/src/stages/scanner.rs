//! Recipe discovery.
//!
//! The orchestrator only needs a [`StageRegistry`]; how recipes are found is
//! up to the [`RecipeScanner`] implementation. [`DirectoryScanner`] covers the
//! common layout of `Dockerfile.<stage>` / `<stage>.Dockerfile` files, each
//! built with its own directory as build context.

use super::{RegistryBuilder, StageName, StageRecord, StageRegistry};
use crate::errors::{BuildError, ConfigurationError};
use crate::recipe::extract_dependencies;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Produces a stage registry from a set of search roots.
pub trait RecipeScanner: Send + Sync {
    /// Scans `roots` and returns the validated registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a recipe cannot be read or the resulting stage set
    /// is invalid (colliding names, unknown dependencies).
    fn scan(&self, roots: &[PathBuf]) -> Result<StageRegistry, BuildError>;
}

/// Scanner for `Dockerfile.<stage>` and `<stage>.Dockerfile` files.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    follow_hidden: bool,
}

impl DirectoryScanner {
    /// Creates a scanner that skips hidden directories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also descends into directories whose name starts with a dot.
    #[must_use]
    pub const fn with_hidden(mut self) -> Self {
        self.follow_hidden = true;
        self
    }

    fn collect(&self, dir: &Path, found: &mut Vec<(StageName, PathBuf)>) -> std::io::Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(fs::DirEntry::file_name);

        for entry in entries {
            let path = entry.path();
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            if entry.file_type()?.is_dir() {
                if self.follow_hidden || !file_name.starts_with('.') {
                    self.collect(&path, found)?;
                }
            } else if let Some(stage) = stage_name_for(&file_name) {
                found.push((StageName::new(stage), path));
            }
        }
        Ok(())
    }
}

/// Returns the stage a recipe file name declares, if any.
fn stage_name_for(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix("Dockerfile.")
        .or_else(|| file_name.strip_suffix(".Dockerfile"))
        .filter(|s| !s.is_empty())
}

impl RecipeScanner for DirectoryScanner {
    fn scan(&self, roots: &[PathBuf]) -> Result<StageRegistry, BuildError> {
        let mut found = Vec::new();
        for root in roots {
            self.collect(root, &mut found)?;
        }

        let mut known: HashSet<StageName> = HashSet::new();
        for (name, path) in &found {
            if let Some(existing) = known.get(name) {
                return Err(ConfigurationError::DuplicateStage {
                    first: existing.to_string(),
                    second: format!("{name} ({})", path.display()),
                }
                .into());
            }
            known.insert(name.clone());
        }

        let mut builder = RegistryBuilder::default();
        for (name, path) in found {
            let body = fs::read_to_string(&path)?;
            let deps = extract_dependencies(&body, &name, &known);
            let context = path
                .parent()
                .map(fs::canonicalize)
                .transpose()?
                .unwrap_or_default();

            debug!(
                stage = %name,
                recipe = %path.display(),
                dependencies = ?deps.dependencies.iter().map(StageName::as_str).collect::<Vec<_>>(),
                "Scanned recipe"
            );

            let record = deps
                .dependencies
                .into_iter()
                .fold(StageRecord::builder(name), |b, dep| b.depends_on(dep))
                .recipe_path(path)
                .build_context(context)
                .args(deps.declared_args)
                .secrets(deps.secrets)
                .body(body)
                .build()?;
            builder.add(record)?;
        }

        Ok(builder.build()?)
    }
}
