//! Fake container runtime for testing.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::errors::RuntimeError;
use crate::runtime::{BuildInvocation, ContainerRuntime, ImageEntry};

/// An in-memory runtime that records calls instead of spawning processes.
///
/// A successful build adds its tag to the image store, so later listings
/// and inspections see it the way a real runtime would.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    invocations: Mutex<Vec<BuildInvocation>>,
    recipes: Mutex<Vec<String>>,
    images: Mutex<Vec<ImageEntry>>,
    failing_tags: Mutex<HashSet<String>>,
    list_calls: Mutex<usize>,
    prune_calls: Mutex<usize>,
    fail_inspect: Mutex<bool>,
    fail_prune: Mutex<bool>,
}

impl RecordingRuntime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the image store with `reference` (`repo:tag`).
    #[must_use]
    pub fn with_image(self, reference: &str) -> Self {
        self.add_image(reference);
        self
    }

    /// Makes builds of `tag` exit non-zero.
    #[must_use]
    pub fn failing_on(self, tag: impl Into<String>) -> Self {
        self.failing_tags.lock().insert(tag.into());
        self
    }

    /// Makes every image id query fail.
    #[must_use]
    pub fn failing_inspect(self) -> Self {
        *self.fail_inspect.lock() = true;
        self
    }

    /// Makes every prune fail.
    #[must_use]
    pub fn failing_prune(self) -> Self {
        *self.fail_prune.lock() = true;
        self
    }

    fn add_image(&self, reference: &str) {
        let (repository, tag) = reference.rsplit_once(':').unwrap_or((reference, "latest"));
        let mut images = self.images.lock();
        let image_id = format!("sha256:{:04}", images.len() + 1);
        images.retain(|e| e.reference() != reference);
        images.push(ImageEntry {
            created_at: Some(Utc::now().into()),
            image_id,
            repository: repository.to_string(),
            tag: tag.to_string(),
        });
    }

    /// Every build invocation, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<BuildInvocation> {
        self.invocations.lock().clone()
    }

    /// Tags passed to builds, in call order.
    #[must_use]
    pub fn built_tags(&self) -> Vec<String> {
        self.invocations.lock().iter().map(|i| i.tag.clone()).collect()
    }

    /// Synthesized recipe text read at each build, in call order.
    #[must_use]
    pub fn recipes(&self) -> Vec<String> {
        self.recipes.lock().clone()
    }

    /// Number of build invocations.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.invocations.lock().len()
    }

    /// Number of image listings.
    #[must_use]
    pub fn list_count(&self) -> usize {
        *self.list_calls.lock()
    }

    /// Number of prunes.
    #[must_use]
    pub fn prune_count(&self) -> usize {
        *self.prune_calls.lock()
    }

    /// Forgets recorded calls; the image store is kept.
    pub fn reset(&self) {
        self.invocations.lock().clear();
        self.recipes.lock().clear();
        *self.list_calls.lock() = 0;
        *self.prune_calls.lock() = 0;
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn build(&self, invocation: &BuildInvocation) -> Result<(), RuntimeError> {
        self.invocations.lock().push(invocation.clone());
        self.recipes
            .lock()
            .push(std::fs::read_to_string(&invocation.recipe_path).unwrap_or_default());

        if self.failing_tags.lock().contains(&invocation.tag) {
            return Err(RuntimeError::NonZeroExit {
                command: format!("build --tag {}", invocation.tag),
                code: Some(1),
                stderr: String::new(),
            });
        }
        self.add_image(&invocation.tag);
        Ok(())
    }

    async fn image_id(&self, tag: &str) -> Result<String, RuntimeError> {
        let missing = || RuntimeError::NonZeroExit {
            command: format!("image inspect {tag}"),
            code: Some(1),
            stderr: format!("No such image: {tag}"),
        };
        if *self.fail_inspect.lock() {
            return Err(missing());
        }
        self.images
            .lock()
            .iter()
            .find(|e| e.reference() == tag)
            .map(|e| e.image_id.clone())
            .ok_or_else(missing)
    }

    async fn list_images(&self, _filters: &[String]) -> Result<Vec<ImageEntry>, RuntimeError> {
        *self.list_calls.lock() += 1;
        Ok(self.images.lock().clone())
    }

    async fn prune(&self, _filters: &[String]) -> Result<(), RuntimeError> {
        *self.prune_calls.lock() += 1;
        if *self.fail_prune.lock() {
            return Err(RuntimeError::NonZeroExit {
                command: "image prune".to_string(),
                code: Some(1),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}
