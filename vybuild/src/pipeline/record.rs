//! Build levels, per-stage tag records and the run summary.

use super::ArgClosure;
use crate::errors::ConfigurationError;
use crate::stages::StageName;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How aggressively cached images are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildLevel {
    /// Never build; trust whatever the runtime already has (`-1`).
    Never,
    /// Rebuild the requested stages; reuse cached dependencies (`0`).
    #[default]
    Requested,
    /// Rebuild every stage in the requested closure (`1`).
    All,
}

impl BuildLevel {
    /// The numeric form used on command lines.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Never => -1,
            Self::Requested => 0,
            Self::All => 1,
        }
    }
}

impl TryFrom<i64> for BuildLevel {
    type Error = ConfigurationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Never),
            0 => Ok(Self::Requested),
            1 => Ok(Self::All),
            other => Err(ConfigurationError::InvalidBuildLevel(other)),
        }
    }
}

impl fmt::Display for BuildLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// What happened to one stage during a build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    /// The stage.
    pub stage_name: StageName,
    /// The stage's tag for this run.
    pub tag: String,
    /// Image id reported by the runtime, if the stage was built.
    pub built_image_hash: Option<String>,
    /// True if the stage was not built (cache hit or build level -1).
    pub skipped: bool,
    /// The stage's transitive argument closure.
    pub args: ArgClosure,
}

impl TagRecord {
    /// Creates a record that is neither built nor skipped yet.
    #[must_use]
    pub fn new(stage_name: StageName, tag: impl Into<String>, args: ArgClosure) -> Self {
        Self {
            stage_name,
            tag: tag.into(),
            built_image_hash: None,
            skipped: false,
            args,
        }
    }

    /// Returns true if the stage was built in this run.
    #[must_use]
    pub const fn was_built(&self) -> bool {
        self.built_image_hash.is_some()
    }
}

impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.built_image_hash, self.skipped) {
            (Some(hash), _) => write!(f, "{}: built as {} ({hash})", self.stage_name, self.tag),
            (None, true) => write!(f, "{}: skipped, using {}", self.stage_name, self.tag),
            (None, false) => write!(f, "{}: pending as {}", self.stage_name, self.tag),
        }
    }
}

/// Outcome of one `build` call.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Identifier of the run, also attached to its tracing span.
    pub run_id: Uuid,
    /// The build level the run used.
    pub level: BuildLevel,
    /// Records in resolution (post-order) order.
    pub records: Vec<TagRecord>,
    /// Number of external build invocations issued.
    pub builds_issued: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl BuildSummary {
    /// Returns the record for `stage`, if it was resolved.
    #[must_use]
    pub fn record(&self, stage: &StageName) -> Option<&TagRecord> {
        self.records.iter().find(|r| &r.stage_name == stage)
    }

    /// Returns the tag computed for `stage`.
    #[must_use]
    pub fn tag_of(&self, stage: &StageName) -> Option<&str> {
        self.record(stage).map(|r| r.tag.as_str())
    }

    /// Records of stages that were built.
    pub fn built(&self) -> impl Iterator<Item = &TagRecord> {
        self.records.iter().filter(|r| r.was_built())
    }

    /// Records of stages that were skipped.
    pub fn skipped(&self) -> impl Iterator<Item = &TagRecord> {
        self.records.iter().filter(|r| r.skipped)
    }
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        write!(
            f,
            "{} built, {} skipped in {:.0}ms",
            self.built().count(),
            self.skipped().count(),
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_level_conversion() {
        assert_eq!(BuildLevel::try_from(-1).unwrap(), BuildLevel::Never);
        assert_eq!(BuildLevel::try_from(0).unwrap(), BuildLevel::Requested);
        assert_eq!(BuildLevel::try_from(1).unwrap(), BuildLevel::All);
        assert!(matches!(
            BuildLevel::try_from(2),
            Err(ConfigurationError::InvalidBuildLevel(2))
        ));
        assert_eq!(BuildLevel::All.to_string(), "1");
    }

    #[test]
    fn test_tag_record_display() {
        let mut record = TagRecord::new("app".into(), "vy__app:latest", ArgClosure::default());
        assert_eq!(record.to_string(), "app: pending as vy__app:latest");

        record.skipped = true;
        assert_eq!(record.to_string(), "app: skipped, using vy__app:latest");

        record.skipped = false;
        record.built_image_hash = Some("sha256:abc".into());
        assert!(record.was_built());
        assert_eq!(record.to_string(), "app: built as vy__app:latest (sha256:abc)");
    }

    #[test]
    fn test_summary_lookup_and_display() {
        let mut built = TagRecord::new("a".into(), "vy__a:latest", ArgClosure::default());
        built.built_image_hash = Some("sha256:1".into());
        let mut skipped = TagRecord::new("b".into(), "vy__b:latest", ArgClosure::default());
        skipped.skipped = true;

        let summary = BuildSummary {
            run_id: Uuid::new_v4(),
            level: BuildLevel::Requested,
            records: vec![built, skipped],
            builds_issued: 1,
            duration_ms: 12.0,
        };

        assert_eq!(summary.tag_of(&"B".into()), Some("vy__b:latest"));
        assert_eq!(summary.built().count(), 1);
        assert!(summary.to_string().ends_with("1 built, 1 skipped in 12ms"));
    }
}
