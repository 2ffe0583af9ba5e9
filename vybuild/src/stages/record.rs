//! Stage names and stage records.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// A case-insensitive stage identifier.
///
/// The original spelling is kept for display; equality, hashing and ordering
/// use the lower-cased form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StageName {
    display: String,
    key: String,
}

impl StageName {
    /// Creates a new stage name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let display = name.into();
        let key = display.to_lowercase();
        Self { display, key }
    }

    /// Returns the name as originally spelled.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Returns the lower-cased lookup key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for StageName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for StageName {}

impl Hash for StageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for StageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<&str> for StageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StageName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<StageName> for String {
    fn from(name: StageName) -> Self {
        name.display
    }
}

/// Immutable description of one buildable stage.
///
/// Records are produced by a recipe scan and never mutated afterwards; a new
/// scan produces a new set of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    name: StageName,
    recipe_path: PathBuf,
    build_context: PathBuf,
    declared_args: Vec<(String, Option<String>)>,
    secrets: Vec<String>,
    depends_on: Vec<StageName>,
    body: String,
}

impl StageRecord {
    /// Starts building a record for `name`.
    #[must_use]
    pub fn builder(name: impl Into<StageName>) -> StageRecordBuilder {
        StageRecordBuilder::new(name.into())
    }

    /// The stage name.
    #[must_use]
    pub const fn name(&self) -> &StageName {
        &self.name
    }

    /// Path of the recipe file the stage came from.
    #[must_use]
    pub fn recipe_path(&self) -> &Path {
        &self.recipe_path
    }

    /// Absolute build context directory.
    #[must_use]
    pub fn build_context(&self) -> &Path {
        &self.build_context
    }

    /// Declared arguments with their defaults, in declaration order.
    #[must_use]
    pub fn declared_args(&self) -> &[(String, Option<String>)] {
        &self.declared_args
    }

    /// Secret ids the stage needs at build time.
    #[must_use]
    pub fn secrets(&self) -> &[String] {
        &self.secrets
    }

    /// Stages this stage depends on, in reference order.
    #[must_use]
    pub fn depends_on(&self) -> &[StageName] {
        &self.depends_on
    }

    /// The original recipe text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the declared default for `key`, if non-empty.
    #[must_use]
    pub fn default_for(&self, key: &str) -> Option<&str> {
        self.declared_args
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
            .filter(|v| !v.is_empty())
    }
}

/// Builder for [`StageRecord`].
#[derive(Debug, Clone)]
pub struct StageRecordBuilder {
    name: StageName,
    recipe_path: PathBuf,
    build_context: Option<PathBuf>,
    declared_args: Vec<(String, Option<String>)>,
    secrets: Vec<String>,
    depends_on: Vec<StageName>,
    body: String,
}

impl StageRecordBuilder {
    fn new(name: StageName) -> Self {
        Self {
            name,
            recipe_path: PathBuf::new(),
            build_context: None,
            declared_args: Vec::new(),
            secrets: Vec::new(),
            depends_on: Vec::new(),
            body: String::new(),
        }
    }

    /// Sets the recipe path.
    #[must_use]
    pub fn recipe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.recipe_path = path.into();
        self
    }

    /// Sets the build context directory.
    #[must_use]
    pub fn build_context(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_context = Some(path.into());
        self
    }

    /// Declares an argument with an optional default.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, default: Option<&str>) -> Self {
        let key = key.into();
        if !self.declared_args.iter().any(|(k, _)| *k == key) {
            self.declared_args.push((key, default.map(String::from)));
        }
        self
    }

    /// Sets all declared arguments at once.
    #[must_use]
    pub fn args(mut self, args: Vec<(String, Option<String>)>) -> Self {
        self.declared_args = args;
        self
    }

    /// Adds a required secret id.
    #[must_use]
    pub fn secret(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.secrets.contains(&id) {
            self.secrets.push(id);
        }
        self
    }

    /// Sets all secret ids at once.
    #[must_use]
    pub fn secrets(mut self, ids: Vec<String>) -> Self {
        self.secrets = ids;
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, dep: impl Into<StageName>) -> Self {
        let dep = dep.into();
        if !self.depends_on.contains(&dep) {
            self.depends_on.push(dep);
        }
        self
    }

    /// Sets the recipe text.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Validates and builds the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the build context is missing, relative, or not a
    /// directory, or if the stage depends on itself.
    pub fn build(self) -> Result<StageRecord, ConfigurationError> {
        let context = self.build_context.unwrap_or_default();
        if !context.is_absolute() || !context.is_dir() {
            return Err(ConfigurationError::InvalidBuildContext {
                stage: self.name.to_string(),
                path: context,
            });
        }
        if self.depends_on.contains(&self.name) {
            return Err(ConfigurationError::SelfDependency {
                stage: self.name.to_string(),
            });
        }

        Ok(StageRecord {
            name: self.name,
            recipe_path: self.recipe_path,
            build_context: context,
            declared_args: self.declared_args,
            secrets: self.secrets,
            depends_on: self.depends_on,
            body: self.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn context() -> PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn test_stage_name_case_insensitive() {
        let a = StageName::new("Base");
        let b = StageName::new("base");

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Base");
        assert_eq!(a.key(), "base");

        let set: HashSet<StageName> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_record_builder() {
        let record = StageRecord::builder("app")
            .build_context(context())
            .arg("FOO", Some("bar"))
            .arg("FOO", Some("ignored"))
            .arg("EMPTY", Some(""))
            .depends_on("base")
            .depends_on("BASE")
            .secret("token")
            .build()
            .unwrap();

        assert_eq!(record.declared_args().len(), 2);
        assert_eq!(record.default_for("FOO"), Some("bar"));
        assert_eq!(record.default_for("EMPTY"), None);
        assert_eq!(record.depends_on(), &[StageName::new("base")]);
        assert_eq!(record.secrets(), &["token".to_string()]);
    }

    #[test]
    fn test_relative_build_context_rejected() {
        let err = StageRecord::builder("app")
            .build_context("relative/dir")
            .build()
            .unwrap_err();

        assert_eq!(err.code(), "CONFIG-BUILD_CONTEXT");
    }

    #[test]
    fn test_missing_build_context_rejected() {
        let err = StageRecord::builder("app").build().unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidBuildContext { .. }));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let err = StageRecord::builder("app")
            .build_context(context())
            .depends_on("APP")
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::SelfDependency { .. }));
    }
}
