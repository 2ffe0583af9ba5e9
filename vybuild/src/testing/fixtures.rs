//! Stage fixtures.

use std::path::PathBuf;

use crate::stages::{StageName, StageRecord};

/// Builds an in-memory stage whose context is the system temp directory.
///
/// Arguments are `(key, default)` pairs.
///
/// # Panics
///
/// Panics if `deps` names the stage itself.
#[must_use]
pub fn stage_record(name: &str, deps: &[&str], args: &[(&str, Option<&str>)]) -> StageRecord {
    StageFixture::new(name).deps(deps).args(args).build()
}

/// Builder for test stages with a generated recipe body.
#[derive(Debug, Clone)]
pub struct StageFixture {
    name: StageName,
    deps: Vec<String>,
    args: Vec<(String, Option<String>)>,
    secrets: Vec<String>,
    context: PathBuf,
}

impl StageFixture {
    /// Starts a fixture for `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: StageName::from(name),
            deps: Vec::new(),
            args: Vec::new(),
            secrets: Vec::new(),
            context: std::env::temp_dir(),
        }
    }

    /// Adds dependencies.
    #[must_use]
    pub fn deps(mut self, deps: &[&str]) -> Self {
        self.deps.extend(deps.iter().map(|d| (*d).to_string()));
        self
    }

    /// Adds argument declarations.
    #[must_use]
    pub fn args(mut self, args: &[(&str, Option<&str>)]) -> Self {
        self.args
            .extend(args.iter().map(|(k, v)| ((*k).to_string(), v.map(String::from))));
        self
    }

    /// Adds a secret id.
    #[must_use]
    pub fn secret(mut self, id: &str) -> Self {
        self.secrets.push(id.to_string());
        self
    }

    /// Sets the build context.
    #[must_use]
    pub fn context(mut self, path: impl Into<PathBuf>) -> Self {
        self.context = path.into();
        self
    }

    /// The recipe body the fixture generates.
    #[must_use]
    pub fn body(&self) -> String {
        let mut body = String::from("FROM alpine:3.19\n");
        for (key, default) in &self.args {
            match default {
                Some(d) => body.push_str(&format!("ARG {key}={d}\n")),
                None => body.push_str(&format!("ARG {key}\n")),
            }
        }
        for dep in &self.deps {
            body.push_str(&format!("COPY --from={dep} /out /deps/{dep}\n"));
        }
        body.push_str(&format!("RUN echo {} > /out\n", self.name));
        body
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics if the record is invalid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> StageRecord {
        let body = self.body();
        let builder = StageRecord::builder(self.name.clone())
            .build_context(self.context)
            .recipe_path(format!("Dockerfile.{}", self.name.key()))
            .args(self.args)
            .secrets(self.secrets)
            .body(body);
        self.deps
            .into_iter()
            .fold(builder, |b, dep| b.depends_on(dep))
            .build()
            .expect("fixture stage must be valid")
    }
}
