//! Release of artifacts produced before listing began
//!
//! Some sources stage their data somewhere (an unload prefix, a scratch
//! directory) before the objects can be listed. The pipeline releases such
//! an area exactly once, whichever way the run ends.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ExtractError, Result};

/// Temporary artifacts owned by a single run
#[async_trait]
pub trait StagingArea: Send + Sync {
    /// Remove the staged artifacts
    async fn release(&self) -> Result<()>;

    /// Short description for logs
    fn describe(&self) -> String {
        "staging area".to_string()
    }
}

/// Local directory staged by an upstream step, removed on release
#[derive(Debug, Clone)]
pub struct DirectoryStaging {
    path: PathBuf,
}

impl DirectoryStaging {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StagingArea for DirectoryStaging {
    async fn release(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExtractError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        format!("staging directory {}", self.path.display())
    }
}

/// Releases a staging area at most once
#[derive(Default)]
pub struct StagingGuard {
    area: Option<Arc<dyn StagingArea>>,
}

impl StagingGuard {
    pub fn new(area: Option<Arc<dyn StagingArea>>) -> Self {
        Self { area }
    }

    /// Whether a release is still outstanding
    pub fn is_pending(&self) -> bool {
        self.area.is_some()
    }

    /// Release the area; later calls are no-ops
    pub async fn release(&mut self) -> Result<()> {
        let Some(area) = self.area.take() else {
            return Ok(());
        };
        tracing::debug!(staging = %area.describe(), "Releasing staged artifacts");
        area.release().await.map_err(|e| {
            tracing::warn!(staging = %area.describe(), error = %e, "Failed to release staged artifacts");
            e
        })
    }

    /// Release the area after `primary` ended the run, keeping both errors
    pub async fn release_after(&mut self, primary: ExtractError) -> ExtractError {
        match self.release().await {
            Ok(()) => primary,
            Err(cleanup) => primary.with_cleanup(cleanup),
        }
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        let Some(area) = self.area.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = area.release().await {
                        tracing::warn!(staging = %area.describe(), error = %e, "Failed to release staged artifacts");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(staging = %area.describe(), "Staged artifacts left behind: no runtime to release them");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts releases and optionally fails them
    #[derive(Default)]
    pub struct CountingStaging {
        pub releases: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl CountingStaging {
        pub fn failing() -> Self {
            Self {
                releases: AtomicUsize::new(0),
                fail: AtomicBool::new(true),
            }
        }

        pub fn count(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StagingArea for CountingStaging {
        async fn release(&self) -> Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ExtractError::Io(std::io::Error::other("staging bucket unreachable")));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CountingStaging;
    use super::*;

    #[tokio::test]
    async fn test_release_once() {
        let area = Arc::new(CountingStaging::default());
        let mut guard = StagingGuard::new(Some(area.clone()));
        assert!(guard.is_pending());
        guard.release().await.unwrap();
        guard.release().await.unwrap();
        drop(guard);
        assert_eq!(area.count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_combined() {
        let area = Arc::new(CountingStaging::failing());
        let mut guard = StagingGuard::new(Some(area.clone()));
        let err = guard.release_after(ExtractError::Cancelled).await;
        assert!(matches!(err, ExtractError::Cleanup { .. }));
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("staging bucket unreachable"));
    }

    #[tokio::test]
    async fn test_directory_staging() {
        let dir = tempfile::TempDir::new().unwrap();
        let staged = dir.path().join("unload");
        std::fs::create_dir_all(staged.join("part")).unwrap();
        std::fs::write(staged.join("part/0.csv"), b"a,b").unwrap();

        let staging = DirectoryStaging::new(&staged);
        staging.release().await.unwrap();
        assert!(!staged.exists());
        // Already gone
        staging.release().await.unwrap();
    }
}
