//! Build argument tables and transitive argument closures.

use crate::errors::ConfigurationError;
use crate::stages::{StageName, StageRecord, StageRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Caller-supplied build argument values.
///
/// Empty values are stored but treated as absent by every lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArgTable {
    values: BTreeMap<String, String>,
}

impl BuildArgTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `KEY=VALUE` pairs. The value may itself contain `=`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidArgument`] for a pair without
    /// `=` or with an empty key.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    table.values.insert(key.trim().to_string(), value.to_string());
                }
                _ => return Err(ConfigurationError::InvalidArgument(pair.to_string())),
            }
        }
        Ok(table)
    }

    /// Sets a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the non-empty value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns true if `key` has a non-empty value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over entries with non-empty values, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries with non-empty values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if no entry has a non-empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildArgTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// The transitive argument closure of a stage.
///
/// Maps every argument key required by the stage or any of its dependencies
/// to the first non-empty default declared for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgClosure {
    entries: BTreeMap<String, Option<String>>,
}

impl ArgClosure {
    /// Creates the closure of a stage's own declarations.
    #[must_use]
    pub fn from_record(record: &StageRecord) -> Self {
        let mut closure = Self::default();
        for (key, default) in record.declared_args() {
            closure.insert(key, default.as_deref());
        }
        closure
    }

    fn insert(&mut self, key: &str, default: Option<&str>) {
        let default = default.filter(|d| !d.is_empty()).map(String::from);
        let slot = self.entries.entry(key.to_string()).or_default();
        if slot.is_none() {
            *slot = default;
        }
    }

    /// Adds every key of `other`, keeping defaults already present.
    pub fn merge(&mut self, other: &Self) {
        for (key, default) in &other.entries {
            self.insert(key, default.as_deref());
        }
    }

    /// Keys in the closure, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns true if `key` is part of the closure.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the default recorded for `key`.
    #[must_use]
    pub fn default_for(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Option::as_deref)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the closure has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys with neither a caller value nor a default, sorted.
    #[must_use]
    pub fn missing(&self, table: &BuildArgTable) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, default)| default.is_none() && !table.contains(key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The caller-supplied values for keys in the closure, sorted by key.
    ///
    /// These are the values a stage's tag is computed from and the values
    /// passed to its build.
    #[must_use]
    pub fn relevant(&self, table: &BuildArgTable) -> Vec<(String, String)> {
        self.entries
            .keys()
            .filter_map(|key| table.get(key).map(|v| (key.clone(), v.to_string())))
            .collect()
    }
}

/// Verifies that every argument needed by the requested stages has a value.
///
/// Every stage in the transitive dependency set of `requested` is checked
/// against its own transitive closure, so a default declared downstream never
/// satisfies a key an upstream stage is built with. Runs before anything is
/// spawned.
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownStage`] for an unknown name and
/// [`ConfigurationError::MissingArguments`] with every missing key, sorted.
pub fn check_args(
    requested: &[StageName],
    registry: &StageRegistry,
    table: &BuildArgTable,
) -> Result<(), ConfigurationError> {
    let mut missing = BTreeSet::new();

    for record in registry.closure(requested)? {
        let mut closure = ArgClosure::default();
        for member in registry.closure(std::slice::from_ref(record.name()))? {
            closure.merge(&ArgClosure::from_record(member));
        }
        missing.extend(closure.missing(table));
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::MissingArguments {
            keys: missing.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage(name: &str, deps: &[&str], args: &[(&str, Option<&str>)]) -> StageRecord {
        let builder = deps.iter().fold(
            StageRecord::builder(name).build_context(std::env::temp_dir()),
            |b, d| b.depends_on(*d),
        );
        args.iter()
            .fold(builder, |b, (k, v)| b.arg(*k, *v))
            .build()
            .unwrap()
    }

    #[test]
    fn test_from_pairs() {
        let table = BuildArgTable::from_pairs(["FOO=bar", "URL=a=b", "EMPTY="]).unwrap();

        assert_eq!(table.get("FOO"), Some("bar"));
        assert_eq!(table.get("URL"), Some("a=b"));
        assert_eq!(table.get("EMPTY"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_from_pairs_rejects_malformed() {
        assert!(matches!(
            BuildArgTable::from_pairs(["NOVALUE"]),
            Err(ConfigurationError::InvalidArgument(_))
        ));
        assert!(BuildArgTable::from_pairs(["=x"]).is_err());
    }

    #[test]
    fn test_closure_merge_keeps_first_default() {
        let mut closure = ArgClosure::from_record(&stage("a", &[], &[("FOO", None), ("BAR", Some("1"))]));
        let other = ArgClosure::from_record(&stage("b", &[], &[("FOO", Some("x")), ("BAR", Some("2"))]));
        closure.merge(&other);

        assert_eq!(closure.keys().collect::<Vec<_>>(), vec!["BAR", "FOO"]);
        assert_eq!(closure.default_for("FOO"), Some("x"));
        assert_eq!(closure.default_for("BAR"), Some("1"));
    }

    #[test]
    fn test_relevant_is_intersection_with_table() {
        let closure = ArgClosure::from_record(&stage("a", &[], &[("FOO", Some("bar")), ("BAZ", None)]));
        let table = BuildArgTable::new().with("FOO", "baz").with("OTHER", "x");

        assert_eq!(closure.relevant(&table), vec![("FOO".to_string(), "baz".to_string())]);
        assert_eq!(closure.missing(&table), vec!["BAZ".to_string()]);
    }

    #[test]
    fn test_check_args_reports_all_missing_keys() {
        let registry = StageRegistry::from_records([
            stage("base", &[], &[("X", None), ("A", None)]),
            stage("app", &["base"], &[("Y", None), ("Z", Some("ok"))]),
        ])
        .unwrap();

        let err = check_args(&["app".into()], &registry, &BuildArgTable::new()).unwrap_err();
        match err {
            ConfigurationError::MissingArguments { keys } => {
                assert_eq!(keys, vec!["A".to_string(), "X".to_string(), "Y".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let table = BuildArgTable::from_pairs(["X=1", "A=2", "Y=3"]).unwrap();
        assert!(check_args(&["app".into()], &registry, &table).is_ok());
    }

    #[test]
    fn test_check_args_downstream_default_does_not_cover_upstream() {
        let registry = StageRegistry::from_records([
            stage("base", &[], &[("X", None)]),
            stage("app", &["base"], &[("X", Some("fallback"))]),
        ])
        .unwrap();

        let err = check_args(&["app".into()], &registry, &BuildArgTable::new()).unwrap_err();
        assert_eq!(err.code(), "CONFIG-MISSING_ARGS");
    }

    #[test]
    fn test_check_args_unknown_stage() {
        let registry = StageRegistry::default();
        let err = check_args(&["ghost".into()], &registry, &BuildArgTable::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownStage { .. }));
    }
}
