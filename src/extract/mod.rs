//! Bounded extraction pipeline
//!
//! Lister → planner (selection container + row budget) → finalized plan →
//! downloader → ordered local files. Listing and planning run sequentially
//! on one task; only the downloader fetches concurrently.
//!
//! # Example
//!
//! ```no_run
//! use orbit_extract::backend::{open_store, BucketUrl, StoreOptions};
//! use orbit_extract::config::ExtractConfig;
//! use orbit_extract::extract::{policy::ExtractPolicy, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> orbit_extract::Result<()> {
//!     let url = BucketUrl::parse("s3://logs/2024/**/*.csv")?;
//!     let mut config = ExtractConfig::default();
//!     config.policy = ExtractPolicy::unlimited().tail_files(5).head_bytes(1 << 20);
//!
//!     let store = open_store(&url, &StoreOptions::from(&config)).await?;
//!     let mut files = Extractor::new(store, &url.pattern, &config)?.run().await?;
//!     while let Some(file) = files.next().await? {
//!         println!("{} -> {}", file.key(), file.path().display());
//!     }
//!     files.close().await
//! }
//! ```

pub mod container;
pub mod download;
pub mod glob;
pub mod lister;
pub mod planner;
pub mod policy;
pub mod rows;
pub mod staging;

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::RemoteStore;
use crate::config::{DownloadConfig, ExtractConfig, GlobLimits};
use crate::error::{ExtractError, Result};

pub use download::{DownloadedFile, Downloader, FileSequence};
pub use glob::KeyMatcher;
pub use lister::{ListingEnd, ObjectLister};
pub use planner::ExtractionPlanner;
pub use policy::{ExtractPolicy, FetchPlan, PlannedObject, Strategy};
pub use staging::{DirectoryStaging, StagingArea, StagingGuard};

/// Finalized plan and how the listing that produced it ended
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionPlan {
    pub pattern: String,
    pub items: Vec<PlannedObject>,
    pub pages: usize,
    pub listed: u64,
    pub matched: usize,
    /// The planner completed before the listing ended
    pub completed_early: bool,
    /// A match or size cap cut the listing short
    pub truncated: bool,
}

impl ExtractionPlan {
    /// Bytes the plan will fetch
    pub fn planned_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.planned_length()).sum()
    }
}

/// One extraction run over a store
pub struct Extractor {
    store: Arc<dyn RemoteStore>,
    matcher: KeyMatcher,
    policy: ExtractPolicy,
    limits: GlobLimits,
    download: DownloadConfig,
    cancel: CancellationToken,
    staging: StagingGuard,
}

impl Extractor {
    /// Validate the pattern and capture the run configuration
    ///
    /// No remote call is made until [`plan`](Self::plan) or [`run`](Self::run).
    pub fn new(store: Arc<dyn RemoteStore>, pattern: &str, config: &ExtractConfig) -> Result<Self> {
        Ok(Self {
            store,
            matcher: KeyMatcher::new(pattern)?,
            policy: config.policy,
            limits: config.glob.effective(),
            download: config.download.clone(),
            cancel: CancellationToken::new(),
            staging: StagingGuard::default(),
        })
    }

    /// Builder pattern: use an external cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builder pattern: release `area` when the run ends
    pub fn with_staging(mut self, area: Arc<dyn StagingArea>) -> Self {
        self.staging = StagingGuard::new(Some(area));
        self
    }

    /// Token that cancels listing and downloads of this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// List and plan without fetching any object bytes
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::NoMatches` when the listing finished without a
    /// single key matching the pattern. A policy that selects nothing from
    /// matching keys yields an empty plan instead.
    #[tracing::instrument(skip(self), fields(pattern = %self.matcher.pattern(), backend = self.store.backend_name()))]
    pub async fn plan(&self) -> Result<ExtractionPlan> {
        let mut lister = ObjectLister::new(
            Arc::clone(&self.store),
            self.matcher.clone(),
            self.limits,
            self.cancel.clone(),
        );
        let mut planner = ExtractionPlanner::new(self.policy);

        while !planner.done() {
            let Some(object) = lister.next_object().await? else {
                break;
            };
            planner.add(object);
        }
        let completed_early = planner.done() && lister.end() == ListingEnd::Open;

        if lister.matched_count() == 0 && !completed_early {
            return Err(ExtractError::NoMatches {
                pattern: self.matcher.pattern().to_string(),
            });
        }

        let plan = ExtractionPlan {
            pattern: self.matcher.pattern().to_string(),
            pages: lister.pages(),
            listed: lister.listed_count(),
            matched: lister.matched_count(),
            completed_early,
            truncated: lister.end().is_truncated(),
            items: planner.into_items(),
        };
        tracing::info!(
            policy = %self.policy,
            pages = plan.pages,
            listed = plan.listed,
            matched = plan.matched,
            selected = plan.items.len(),
            bytes = plan.planned_bytes(),
            completed_early = plan.completed_early,
            truncated = plan.truncated,
            "Plan finalized"
        );
        Ok(plan)
    }

    /// Plan only, then release the staging area
    pub async fn dry_run(mut self) -> Result<ExtractionPlan> {
        let planned = self.plan().await;
        match planned {
            Ok(plan) => {
                self.staging.release().await?;
                Ok(plan)
            }
            Err(e) => Err(self.staging.release_after(e).await),
        }
    }

    /// Plan, then start downloading the plan
    ///
    /// The staging area is handed to the returned sequence, which releases it
    /// once exhausted or closed. A planning failure releases it immediately.
    pub async fn run(mut self) -> Result<FileSequence> {
        let plan = match self.plan().await {
            Ok(plan) => plan,
            Err(e) => return Err(self.staging.release_after(e).await),
        };

        let downloader = Downloader::new(
            Arc::clone(&self.store),
            &self.download,
            self.cancel.clone(),
        );
        let staging = std::mem::take(&mut self.staging);
        downloader.start(plan.items, staging).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InjectedFailure, MemoryStore};
    use crate::extract::staging::testing::CountingStaging;

    fn config(policy: ExtractPolicy) -> ExtractConfig {
        let mut config = ExtractConfig::default();
        config.policy = policy;
        config.glob.page_size = 2;
        config
    }

    fn store(keys: &[(&str, usize)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (key, size) in keys {
            store.add_sized(*key, *size, b'z');
        }
        store
    }

    fn keys(plan: &ExtractionPlan) -> Vec<&str> {
        plan.items.iter().map(|i| i.key()).collect()
    }

    #[tokio::test]
    async fn test_tail_files_plan() {
        let store = store(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]);
        let extractor = Extractor::new(
            Arc::new(store.clone()),
            "*",
            &config(ExtractPolicy::unlimited().tail_files(2)),
        )
        .unwrap();

        let plan = extractor.plan().await.unwrap();
        assert_eq!(keys(&plan), vec!["c", "d"]);
        assert!(!plan.completed_early);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_head_files_stops_listing_early() {
        let store = store(&[("a", 1), ("b", 1), ("c", 1), ("d", 1), ("e", 1), ("f", 1)]);
        let extractor = Extractor::new(
            Arc::new(store.clone()),
            "*",
            &config(ExtractPolicy::unlimited().head_files(2)),
        )
        .unwrap();

        let plan = extractor.plan().await.unwrap();
        assert_eq!(keys(&plan), vec!["a", "b"]);
        assert!(plan.completed_early);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_global_head_bytes_plan() {
        let store = store(&[("a", 100), ("b", 100), ("c", 100)]);
        let extractor = Extractor::new(
            Arc::new(store.clone()),
            "*",
            &config(ExtractPolicy::unlimited().head_bytes(150)),
        )
        .unwrap();

        let plan = extractor.plan().await.unwrap();
        assert_eq!(keys(&plan), vec!["a", "b"]);
        assert_eq!(plan.planned_bytes(), 150);
        assert!(plan.completed_early);
    }

    #[tokio::test]
    async fn test_no_matches() {
        let store = store(&[("a.txt", 1)]);
        let extractor =
            Extractor::new(Arc::new(store), "*.csv", &config(ExtractPolicy::unlimited())).unwrap();
        assert!(matches!(
            extractor.plan().await,
            Err(ExtractError::NoMatches { .. })
        ));
    }

    #[tokio::test]
    async fn test_degenerate_policy_is_empty_success() {
        let store = store(&[("a.csv", 1)]);
        let extractor = Extractor::new(
            Arc::new(store.clone()),
            "*.csv",
            &config(ExtractPolicy::unlimited().head_files(0)),
        )
        .unwrap();

        let mut files = extractor.run().await.unwrap();
        assert!(files.next().await.unwrap().is_none());
        files.close().await.unwrap();
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_tail_and_per_object_limits_skip_listing() {
        crate::logging::init_test_logging();
        let objects = [("a", 5), ("b", 5), ("c", 5), ("d", 5), ("e", 5), ("f", 5)];
        for policy in [
            ExtractPolicy::unlimited().tail_files(0),
            ExtractPolicy::unlimited().tail_files(-1),
            ExtractPolicy::unlimited().tail_bytes(0),
            ExtractPolicy::unlimited().tail_bytes(-10),
            ExtractPolicy::unlimited().head_files(2).head_bytes(0),
            ExtractPolicy::unlimited().tail_files(2).tail_bytes(0),
        ] {
            let store = store(&objects);
            let mut config = config(policy);
            config.glob.max_objects_listed = 3;
            let extractor = Extractor::new(Arc::new(store.clone()), "*", &config).unwrap();

            let plan = extractor.plan().await.unwrap();
            assert!(plan.items.is_empty(), "{}", policy);
            assert_eq!(store.list_calls(), 0, "{}", policy);

            let mut files = extractor.run().await.unwrap();
            assert!(files.next().await.unwrap().is_none(), "{}", policy);
            files.close().await.unwrap();
            assert_eq!(store.list_calls(), 0, "{}", policy);
            assert_eq!(store.fetch_calls(), 0, "{}", policy);
        }
    }

    #[test]
    fn test_invalid_pattern_rejected_before_listing() {
        let store = MemoryStore::new();
        let result = Extractor::new(
            Arc::new(store.clone()),
            "data/[oops",
            &ExtractConfig::default(),
        );
        assert!(matches!(result, Err(ExtractError::Config(_))));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_planning_failure_releases_staging() {
        let store = store(&[("a", 1)]);
        store.fail_listing(InjectedFailure::PermissionDenied, 0);
        let staging = Arc::new(CountingStaging::default());

        let result = Extractor::new(Arc::new(store), "*", &config(ExtractPolicy::unlimited()))
            .unwrap()
            .with_staging(staging.clone())
            .run()
            .await;
        assert!(matches!(result, Err(ExtractError::PermissionDenied { .. })));
        assert_eq!(staging.count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_releases_staging() {
        let store = store(&[("a", 1)]);
        let staging = Arc::new(CountingStaging::default());
        let plan = Extractor::new(Arc::new(store), "*", &config(ExtractPolicy::unlimited()))
            .unwrap()
            .with_staging(staging.clone())
            .dry_run()
            .await
            .unwrap();
        assert_eq!(plan.items.len(), 1);
        assert_eq!(staging.count(), 1);
    }
}
