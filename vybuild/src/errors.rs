//! Error types for vybuild.
//!
//! The taxonomy mirrors the four failure classes of a build run:
//! configuration problems detected before anything is spawned, secret
//! provisioning failures, external build failures and failures to read a
//! built image back from the runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for a build run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The stage graph or the supplied arguments are invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Secrets for a stage could not be provisioned.
    #[error("Secret provisioning failed for stage '{stage}': {source}")]
    SecretProvisioning {
        /// The stage whose secrets were requested.
        stage: String,
        /// The underlying provisioning error.
        #[source]
        source: SecretError,
    },

    /// The external build command failed.
    #[error("Build of stage '{stage}' as {tag} failed: {source}")]
    ExternalBuild {
        /// The stage being built.
        stage: String,
        /// The tag the image would have received.
        tag: String,
        /// The underlying runtime error.
        #[source]
        source: RuntimeError,
    },

    /// The built image could not be read back from the runtime.
    #[error("Could not inspect image {tag} for stage '{stage}': {source}")]
    ExternalInspection {
        /// The stage that was built.
        stage: String,
        /// The tag that was queried.
        tag: String,
        /// The underlying runtime error.
        #[source]
        source: RuntimeError,
    },

    /// Querying or pruning the runtime's image store failed.
    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Returns true if the error was detected before any external process ran.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Configuration errors. Always fatal.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// A dependency cycle was found.
    #[error("{0}")]
    Cycle(#[from] CycleDetectedError),

    /// A requested or referenced stage does not exist.
    #[error("Unknown stage: '{name}'")]
    UnknownStage {
        /// The unknown stage name.
        name: String,
    },

    /// A stage depends on a stage that is not registered.
    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency {
        /// The stage declaring the dependency.
        stage: String,
        /// The missing dependency.
        dependency: String,
    },

    /// A stage lists itself as a dependency.
    #[error("Stage '{stage}' cannot depend on itself")]
    SelfDependency {
        /// The stage name.
        stage: String,
    },

    /// Two stages collide once their names are lower-cased.
    #[error("Stage names '{first}' and '{second}' collide (names are case-insensitive)")]
    DuplicateStage {
        /// The stage registered first.
        first: String,
        /// The colliding stage.
        second: String,
    },

    /// Required build arguments have no value.
    #[error("Missing values for build arguments: {}", keys.join(", "))]
    MissingArguments {
        /// The keys without a value, sorted.
        keys: Vec<String>,
    },

    /// A build context path is not an absolute directory.
    #[error("Invalid build context for stage '{stage}': {}", path.display())]
    InvalidBuildContext {
        /// The stage name.
        stage: String,
        /// The offending path.
        path: PathBuf,
    },

    /// A build level outside {-1, 0, 1}.
    #[error("Invalid build level {0}; expected -1, 0 or 1")]
    InvalidBuildLevel(i64),

    /// A malformed `key=value` argument.
    #[error("Invalid build argument '{0}'; expected KEY=VALUE")]
    InvalidArgument(String),
}

impl ConfigurationError {
    /// Returns a stable code identifying the error class.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Cycle(_) => "CONFIG-CYCLE",
            Self::UnknownStage { .. } => "CONFIG-UNKNOWN_STAGE",
            Self::UnknownDependency { .. } => "CONFIG-MISSING_DEP",
            Self::SelfDependency { .. } => "CONFIG-SELF_DEP",
            Self::DuplicateStage { .. } => "CONFIG-DUPLICATE",
            Self::MissingArguments { .. } => "CONFIG-MISSING_ARGS",
            Self::InvalidBuildContext { .. } => "CONFIG-BUILD_CONTEXT",
            Self::InvalidBuildLevel(_) => "CONFIG-BUILD_LEVEL",
            Self::InvalidArgument(_) => "CONFIG-ARGUMENT",
        }
    }

    /// Returns a hint for fixing the error.
    #[must_use]
    pub const fn fix_hint(&self) -> &'static str {
        match self {
            Self::Cycle(_) => "Remove one of the FROM/COPY --from references in the cycle.",
            Self::UnknownStage { .. } | Self::UnknownDependency { .. } => {
                "Check the stage name for typos; stage names come from recipe file names."
            }
            Self::SelfDependency { .. } => "A recipe cannot reference its own stage.",
            Self::DuplicateStage { .. } => "Rename one of the recipes so the names differ in more than case.",
            Self::MissingArguments { .. } => "Pass KEY=VALUE for each missing argument or give the ARG a default.",
            Self::InvalidBuildContext { .. } => "Build contexts must be absolute paths to existing directories.",
            Self::InvalidBuildLevel(_) => "Use -1 (never build), 0 (requested stages) or 1 (everything).",
            Self::InvalidArgument(_) => "Arguments are written as KEY=VALUE.",
        }
    }

    /// Converts to a dictionary representation for structured logging.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("fix_hint".to_string(), serde_json::json!(self.fix_hint()));
        match self {
            Self::Cycle(err) => {
                map.insert("cycle_path".to_string(), serde_json::json!(err.cycle_path));
            }
            Self::MissingArguments { keys } => {
                map.insert("keys".to_string(), serde_json::json!(keys));
            }
            _ => {}
        }
        map
    }
}

/// Error raised when a cycle is detected in the stage graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in stage dependencies: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle, first stage repeated at the end.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

/// Errors returned by a secret provisioner.
#[derive(Debug, Clone, Error)]
pub enum SecretError {
    /// No source is known for the secret.
    #[error("secret '{id}' is not available")]
    NotFound {
        /// The secret id.
        id: String,
    },

    /// The secret source exists but cannot be used.
    #[error("secret '{id}' is unusable: {reason}")]
    Unusable {
        /// The secret id.
        id: String,
        /// Why it cannot be used.
        reason: String,
    },
}

/// Errors from the container runtime seam.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The runtime binary could not be spawned.
    #[error("failed to run '{program}': {reason}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// The spawn error.
        reason: String,
    },

    /// The command exited unsuccessfully.
    #[error("'{command}' exited with status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        /// The command line, for diagnostics.
        command: String,
        /// The exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The command succeeded but its output could not be understood.
    #[error("unexpected output from '{command}': {reason}")]
    Output {
        /// The command line, for diagnostics.
        command: String,
        /// What was wrong with the output.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        let config: ConfigurationError = err.into();
        assert_eq!(config.code(), "CONFIG-CYCLE");
    }

    #[test]
    fn test_missing_arguments_message() {
        let err = ConfigurationError::MissingArguments {
            keys: vec!["BAR".to_string(), "FOO".to_string()],
        };

        assert_eq!(err.to_string(), "Missing values for build arguments: BAR, FOO");
        let dict = err.to_dict();
        assert_eq!(dict.get("code").unwrap(), "CONFIG-MISSING_ARGS");
        assert_eq!(dict.get("keys").unwrap(), &serde_json::json!(["BAR", "FOO"]));
    }

    #[test]
    fn test_build_error_classification() {
        let err: BuildError = ConfigurationError::UnknownStage { name: "x".into() }.into();
        assert!(err.is_configuration());

        let err = BuildError::ExternalBuild {
            stage: "app".into(),
            tag: "vy__app:latest".into(),
            source: RuntimeError::NonZeroExit {
                command: "docker build".into(),
                code: Some(1),
                stderr: String::new(),
            },
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("vy__app:latest"));
        assert!(err.to_string().contains("status 1"));
    }

    #[test]
    fn test_signal_exit_message() {
        let err = RuntimeError::NonZeroExit {
            command: "docker build".into(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().ends_with("status signal"));
    }
}
