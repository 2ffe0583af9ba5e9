//! Validated stage registry.

use super::{StageName, StageRecord};
use crate::errors::ConfigurationError;
use std::collections::{HashMap, HashSet};

/// A validated set of stage records keyed by case-insensitive name.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<StageName, StageRecord>,
    order: Vec<StageName>,
}

impl StageRegistry {
    /// Creates a registry builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds a registry from records in one step.
    ///
    /// # Errors
    ///
    /// Returns an error on colliding names or unknown dependencies.
    pub fn from_records(
        records: impl IntoIterator<Item = StageRecord>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Self::builder();
        for record in records {
            builder.add(record)?;
        }
        builder.build()
    }

    /// Returns the record for `name`, if registered.
    #[must_use]
    pub fn get(&self, name: &StageName) -> Option<&StageRecord> {
        self.stages.get(name)
    }

    /// Returns the record for `name` or an unknown-stage error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownStage`] if no such stage exists.
    pub fn lookup(&self, name: &StageName) -> Result<&StageRecord, ConfigurationError> {
        self.get(name).ok_or_else(|| ConfigurationError::UnknownStage {
            name: name.to_string(),
        })
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &StageName) -> bool {
        self.stages.contains_key(name)
    }

    /// Stage names in registration order.
    #[must_use]
    pub fn names(&self) -> &[StageName] {
        &self.order
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Collects every stage reachable from `roots`, roots included.
    ///
    /// Each stage appears once, in depth-first discovery order. Cycles are
    /// tolerated here; they are reported by the orchestrator's traversal.
    ///
    /// # Errors
    ///
    /// Returns an error if a root is not registered.
    pub fn closure<'a>(
        &'a self,
        roots: &[StageName],
    ) -> Result<Vec<&'a StageRecord>, ConfigurationError> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut stack: Vec<&StageName> = Vec::new();

        for root in roots.iter().rev() {
            self.lookup(root)?;
            stack.push(root);
        }

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let record = self.lookup(name)?;
            result.push(record);
            for dep in record.depends_on().iter().rev() {
                if !seen.contains(dep) {
                    stack.push(dep);
                }
            }
        }

        Ok(result)
    }
}

/// Incremental builder for a [`StageRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    stages: HashMap<StageName, StageRecord>,
    order: Vec<StageName>,
}

impl RegistryBuilder {
    /// Adds a record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateStage`] if a stage with the
    /// same lower-cased name is already present.
    pub fn add(&mut self, record: StageRecord) -> Result<(), ConfigurationError> {
        if let Some(existing) = self.stages.get(record.name()) {
            return Err(ConfigurationError::DuplicateStage {
                first: existing.name().to_string(),
                second: record.name().to_string(),
            });
        }
        self.order.push(record.name().clone());
        self.stages.insert(record.name().clone(), record);
        Ok(())
    }

    /// Adds a record, builder style.
    ///
    /// # Errors
    ///
    /// See [`RegistryBuilder::add`].
    pub fn stage(mut self, record: StageRecord) -> Result<Self, ConfigurationError> {
        self.add(record)?;
        Ok(self)
    }

    /// Validates dependencies and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownDependency`] if any stage depends
    /// on an unregistered stage.
    pub fn build(self) -> Result<StageRegistry, ConfigurationError> {
        for name in &self.order {
            let record = &self.stages[name];
            if let Some(missing) = record.depends_on().iter().find(|d| !self.stages.contains_key(*d)) {
                return Err(ConfigurationError::UnknownDependency {
                    stage: name.to_string(),
                    dependency: missing.to_string(),
                });
            }
        }

        Ok(StageRegistry {
            stages: self.stages,
            order: self.order,
        })
    }
}
