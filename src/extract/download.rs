//! Plan-driven downloader
//!
//! Fetches the planned bytes of every object into a per-run scratch
//! directory and hands the files out in plan order. Up to `workers` fetches
//! run concurrently; `buffered` keeps their results in plan order.
//!
//! The scratch directory is removed when a fetch fails, when the run is
//! cancelled, on [`FileSequence::close`], and when the sequence is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::backend::RemoteStore;
use crate::config::DownloadConfig;
use crate::error::{ExtractError, Result};
use crate::stats::ExtractStats;

use super::policy::PlannedObject;
use super::staging::StagingGuard;

/// A planned object materialized as a local file
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub item: PlannedObject,
    pub path: PathBuf,
    pub bytes: u64,
}

impl DownloadedFile {
    pub fn key(&self) -> &str {
        self.item.key()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct Downloader {
    store: Arc<dyn RemoteStore>,
    workers: usize,
    temp_root: Option<PathBuf>,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(store: Arc<dyn RemoteStore>, config: &DownloadConfig, cancel: CancellationToken) -> Self {
        Self {
            store,
            workers: config.workers.max(1),
            temp_root: config.temp_root.clone(),
            cancel,
        }
    }

    /// Start materializing `items`; fetches proceed as the sequence is read
    pub async fn start(
        &self,
        items: Vec<PlannedObject>,
        mut staging: StagingGuard,
    ) -> Result<FileSequence> {
        let paths = match local_paths(&items) {
            Ok(paths) => paths,
            Err(e) => return Err(staging.release_after(e).await),
        };
        let scratch = match self.create_scratch() {
            Ok(dir) => dir,
            Err(e) => return Err(staging.release_after(e.into()).await),
        };
        let stats = ExtractStats::start(&items);
        tracing::info!(
            objects = stats.planned_objects,
            bytes = stats.planned_bytes,
            workers = self.workers,
            scratch = %scratch.path().display(),
            "Downloading plan"
        );

        let store = Arc::clone(&self.store);
        let cancel = self.cancel.clone();
        let root = scratch.path().to_path_buf();
        let fetches = stream::iter(items.into_iter().zip(paths))
            .map(move |(item, rel)| {
                fetch_one(Arc::clone(&store), cancel.clone(), root.join(rel), item)
            })
            .buffered(self.workers)
            .boxed();

        Ok(FileSequence {
            fetches: Some(fetches),
            scratch: Some(scratch),
            handed_out: Vec::new(),
            staging,
            stats,
            cancel: self.cancel.clone(),
        })
    }

    fn create_scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("orbit-extract-");
        match &self.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}

/// Local location of `key` under `root`, one directory per key segment
///
/// Empty and `.` segments are skipped; `..` is rejected.
pub fn key_path(root: &Path, key: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    let mut segments = 0;
    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(ExtractError::FatalRemote(format!(
                    "object key '{}' escapes the directory",
                    key
                )))
            }
            s => {
                path.push(s);
                segments += 1;
            }
        }
    }
    if segments == 0 {
        return Err(ExtractError::FatalRemote(format!(
            "object key '{}' has no file name",
            key
        )));
    }
    Ok(path)
}

/// Scratch-relative path of every item, in plan order
///
/// Two keys may name the same file (`a//b` and `a/b`), or one may name a
/// directory the other needs (`a` and `a/b`). Both are rejected up front.
fn local_paths(items: &[PlannedObject]) -> Result<Vec<PathBuf>> {
    let paths = items
        .iter()
        .map(|item| key_path(Path::new(""), item.key()))
        .collect::<Result<Vec<_>>>()?;

    // Component order puts every path right before its descendants
    let mut sorted: Vec<(&PathBuf, &str)> = paths
        .iter()
        .zip(items.iter().map(PlannedObject::key))
        .collect();
    sorted.sort();
    for pair in sorted.windows(2) {
        let ((first, first_key), (second, second_key)) = (pair[0], pair[1]);
        if second.starts_with(first) {
            return Err(ExtractError::FatalRemote(format!(
                "keys '{}' and '{}' collide at local path {}",
                first_key,
                second_key,
                first.display()
            )));
        }
    }
    Ok(paths)
}

async fn fetch_one(
    store: Arc<dyn RemoteStore>,
    cancel: CancellationToken,
    path: PathBuf,
    item: PlannedObject,
) -> Result<DownloadedFile> {
    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
        written = write_object(store.as_ref(), &item, &path) => written?,
    };
    tracing::debug!(key = %item.key(), plan = %item.plan, bytes, "Fetched object");
    Ok(DownloadedFile { item, path, bytes })
}

async fn write_object(store: &dyn RemoteStore, item: &PlannedObject, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;

    let expected = item.planned_length();
    let mut written = 0u64;
    if expected > 0 {
        let mut body = store.fetch_range(item.key(), item.plan.range()).await?;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                ExtractError::TransientRemote(format!("reading '{}': {}", item.key(), e))
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
    }
    file.flush().await?;

    if written != expected {
        return Err(ExtractError::FatalRemote(format!(
            "'{}' returned {} bytes, expected {}",
            item.key(),
            written,
            expected
        )));
    }
    Ok(written)
}

/// Finite, ordered, single-pass sequence of downloaded files
///
/// Files handed out by one call to [`next_batch`](Self::next_batch) are
/// deleted on the next call; copy them elsewhere to keep them.
pub struct FileSequence {
    fetches: Option<BoxStream<'static, Result<DownloadedFile>>>,
    scratch: Option<TempDir>,
    handed_out: Vec<PathBuf>,
    staging: StagingGuard,
    stats: ExtractStats,
    cancel: CancellationToken,
}

impl FileSequence {
    /// Next file, or `None` once the plan is exhausted
    pub async fn next(&mut self) -> Result<Option<DownloadedFile>> {
        Ok(self.next_batch(1).await?.pop())
    }

    /// Up to `n` further files in plan order; empty once the plan is exhausted
    ///
    /// # Errors
    ///
    /// Any fetch failure or cancellation ends the sequence: in-flight fetches
    /// are dropped and the scratch directory is removed before the error is
    /// returned. Later calls return no files.
    pub async fn next_batch(&mut self, n: usize) -> Result<Vec<DownloadedFile>> {
        self.remove_handed_out().await;

        let mut batch = Vec::new();
        while batch.len() < n {
            let Some(fetches) = self.fetches.as_mut() else {
                break;
            };
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Some(Err(ExtractError::Cancelled)),
                next = fetches.next() => next,
            };

            match next {
                Some(Ok(file)) => {
                    self.stats.record(&file.item, file.bytes);
                    self.handed_out.push(file.path.clone());
                    batch.push(file);
                }
                Some(Err(e)) => return Err(self.abort(e).await),
                None => {
                    self.fetches = None;
                    self.stats.touch();
                    tracing::info!(summary = %self.stats.summary(), "Download complete");
                    if let Err(e) = self.staging.release().await {
                        return Err(self.abort(e).await);
                    }
                }
            }
        }
        Ok(batch)
    }

    /// Stop the sequence and remove every local file it still holds
    pub async fn close(&mut self) -> Result<()> {
        self.fetches = None;
        self.handed_out.clear();

        let removed = match self.scratch.take() {
            Some(scratch) => scratch.close().map_err(ExtractError::from),
            None => Ok(()),
        };
        let released = self.staging.release().await;

        match (removed, released) {
            (Ok(()), released) => released,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(staging)) => Err(e.with_cleanup(staging)),
        }
    }

    /// Download measures so far
    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    /// Scratch directory while the sequence still holds one
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|d| d.path())
    }

    /// Whether every planned file has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.fetches.is_none()
    }

    async fn remove_handed_out(&mut self) {
        for path in self.handed_out.drain(..) {
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove consumed file");
                }
            }
        }
    }

    async fn abort(&mut self, primary: ExtractError) -> ExtractError {
        self.fetches = None;
        self.handed_out.clear();
        self.stats.touch();

        let mut error = primary;
        if let Some(scratch) = self.scratch.take() {
            if let Err(e) = scratch.close() {
                error = error.with_cleanup(e);
            }
        }
        let error = self.staging.release_after(error).await;
        tracing::warn!(
            error = %error,
            fetched = self.stats.objects_fetched,
            planned = self.stats.planned_objects,
            "Download aborted"
        );
        error
    }
}
