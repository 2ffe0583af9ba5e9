//! Build-time secret provisioning.
//!
//! A stage that mounts `--mount=type=secret,id=<id>` needs the runtime to be
//! told where each secret lives. A [`SecretProvisioner`] turns the ids a
//! stage declares into extra build flags, and fails before the build starts
//! if any of them cannot be provided.

use crate::errors::SecretError;
use crate::stages::StageName;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supplies build flags for the secrets a stage declares.
pub trait SecretProvisioner: Send + Sync {
    /// Returns the extra build flags exposing `ids` to the build of `stage`.
    ///
    /// # Errors
    ///
    /// Returns a [`SecretError`] for the first id that cannot be provided.
    fn provision(&self, stage: &StageName, ids: &[String]) -> Result<Vec<String>, SecretError>;
}

/// Provisioner for environments without secrets.
///
/// Accepts stages that declare none and rejects every id otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl SecretProvisioner for NoSecrets {
    fn provision(&self, _stage: &StageName, ids: &[String]) -> Result<Vec<String>, SecretError> {
        match ids.first() {
            Some(id) => Err(SecretError::NotFound { id: id.clone() }),
            None => Ok(Vec::new()),
        }
    }
}

/// Reads each secret from a file named after its id in one directory.
#[derive(Debug, Clone)]
pub struct DirectorySecretProvisioner {
    dir: PathBuf,
}

impl DirectorySecretProvisioner {
    /// Creates a provisioner reading from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The secrets directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn source_for(&self, id: &str) -> Result<PathBuf, SecretError> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(SecretError::Unusable {
                id: id.to_string(),
                reason: "id is not a plain file name".to_string(),
            });
        }

        let path = self.dir.join(id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SecretError::NotFound { id: id.to_string() })
        }
    }
}

impl SecretProvisioner for DirectorySecretProvisioner {
    fn provision(&self, stage: &StageName, ids: &[String]) -> Result<Vec<String>, SecretError> {
        let mut flags = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            let source = self.source_for(id)?;
            debug!(stage = %stage, secret = %id, "Provisioned secret");
            flags.push("--secret".to_string());
            flags.push(format!("id={id},src={}", source.display()));
        }
        Ok(flags)
    }
}
