// src/watch/watcher.rs

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::{RelaunchError, Result};
use crate::watch::filter::{relative_str, WatchFilter};

/// Subtracted from a scan's start time before it becomes the checkpoint.
/// Filesystem timestamps come from a coarse clock and can lag real time.
const CHECKPOINT_SLACK: Duration = Duration::from_millis(10);

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The first path found modified after the checkpoint.
    Changed(PathBuf),
    Unchanged,
}

/// Request-driven change detector over a working tree.
///
/// Nothing runs in the background: each [`Watcher::scan`] walks the tree
/// once and compares modification times against the checkpoint.
#[derive(Debug)]
pub struct Watcher {
    root: PathBuf,
    filter: Arc<WatchFilter>,
    checkpoint: SystemTime,
}

impl Watcher {
    /// Watch `root`; everything modified before now counts as seen.
    pub fn new(root: impl Into<PathBuf>, filter: WatchFilter) -> Self {
        Self::with_checkpoint(root, filter, SystemTime::now())
    }

    pub fn with_checkpoint(root: impl Into<PathBuf>, filter: WatchFilter, checkpoint: SystemTime) -> Self {
        let root = root.into();
        // Canonicalize once so relative paths are stable.
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            filter: Arc::new(filter),
            checkpoint,
        }
    }

    pub fn checkpoint(&self) -> SystemTime {
        self.checkpoint
    }

    /// Walk the tree on the blocking pool and report the first change.
    ///
    /// The checkpoint advances only when the walk completed, and never past
    /// the moment the walk started.
    pub async fn scan(&mut self) -> Result<ScanOutcome> {
        let started = SystemTime::now();
        let root = self.root.clone();
        let filter = Arc::clone(&self.filter);
        let checkpoint = self.checkpoint;

        let found = tokio::task::spawn_blocking(move || scan_tree(&root, &filter, checkpoint))
            .await
            .map_err(|e| RelaunchError::WatchError(format!("scan task failed: {e}")))??;

        let next = started.checked_sub(CHECKPOINT_SLACK).unwrap_or(started);
        if next > self.checkpoint {
            self.checkpoint = next;
        }

        match found {
            Some(path) => {
                info!(path = %path.display(), "change detected");
                Ok(ScanOutcome::Changed(path))
            }
            None => {
                debug!(root = %self.root.display(), "no changes");
                Ok(ScanOutcome::Unchanged)
            }
        }
    }
}

/// Synchronous walk. Returns the first path modified strictly after
/// `checkpoint`.
///
/// Directory mtimes count only without an extension filter; they are what
/// reveals deleted or renamed files.
pub fn scan_tree(root: &Path, filter: &WatchFilter, checkpoint: SystemTime) -> Result<Option<PathBuf>> {
    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        let rel = relative_str(root, entry.path()).unwrap_or_default();
        let name = entry.file_name().to_string_lossy();
        !filter.skip_dir(&rel, &name, entry.depth())
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Deleted while walking.
            Err(e) if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => continue,
            Err(e) => return Err(RelaunchError::WatchError(e.to_string())),
        };

        let is_dir = entry.file_type().is_dir();
        if is_dir {
            if filter.has_extension_filter() {
                continue;
            }
        } else if !filter.accepts_file(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let modified = match entry.metadata() {
            Ok(meta) => meta.modified()?,
            Err(e) if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => continue,
            Err(e) => return Err(RelaunchError::WatchError(e.to_string())),
        };

        if modified > checkpoint {
            return Ok(Some(entry.into_path()));
        }
    }

    Ok(None)
}
