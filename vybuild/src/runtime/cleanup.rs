//! Removal of intermediate images.

use super::ContainerRuntime;
use crate::errors::RuntimeError;
use crate::recipe::REMOVE_LABEL;
use tracing::{debug, warn};

/// Prunes dangling images left behind by multi-stage builds.
///
/// Synthesized recipes label every intermediate `FROM` with
/// `vy.remove=1`, so pruning on that label only touches images this crate
/// produced.
#[derive(Debug, Clone)]
pub struct CleanupSweeper {
    filters: Vec<String>,
}

impl Default for CleanupSweeper {
    fn default() -> Self {
        Self::new(vec![format!("label={REMOVE_LABEL}=1")])
    }
}

impl CleanupSweeper {
    /// Creates a sweeper pruning images that match all `filters`.
    #[must_use]
    pub fn new(filters: Vec<String>) -> Self {
        Self { filters }
    }

    /// The prune filters.
    #[must_use]
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Runs one prune.
    ///
    /// # Errors
    ///
    /// Propagates the runtime's prune failure.
    pub async fn sweep(&self, runtime: &dyn ContainerRuntime) -> Result<(), RuntimeError> {
        debug!(filters = ?self.filters, "Pruning intermediate images");
        runtime.prune(&self.filters).await
    }

    /// Runs one prune, logging instead of returning a failure.
    ///
    /// Returns true if the prune succeeded.
    pub async fn sweep_logged(&self, runtime: &dyn ContainerRuntime) -> bool {
        match self.sweep(runtime).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to prune intermediate images");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockContainerRuntime;

    #[test]
    fn test_default_filter() {
        assert_eq!(CleanupSweeper::default().filters(), ["label=vy.remove=1"]);
    }

    #[tokio::test]
    async fn test_sweep_passes_filters() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_prune()
            .withf(|filters| filters == ["label=vy.remove=1".to_string()])
            .times(1)
            .returning(|_| Ok(()));

        assert!(CleanupSweeper::default().sweep_logged(&runtime).await);
    }

    #[tokio::test]
    async fn test_sweep_failure_is_only_logged() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_prune().returning(|_| {
            Err(RuntimeError::NonZeroExit {
                command: "docker image prune".into(),
                code: Some(1),
                stderr: "daemon unavailable".into(),
            })
        });

        let sweeper = CleanupSweeper::default();
        assert!(!sweeper.sweep_logged(&runtime).await);
        assert!(sweeper.sweep(&runtime).await.is_err());
    }
}
