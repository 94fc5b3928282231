// src/watch/filter.rs

//! Which directories and files take part in change detection.

use std::path::Path;

use crate::config::WatchSection;

/// Compiled ignore rules and extension filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchFilter {
    /// Directory names or root-relative paths (forward slashes) to skip.
    ignore: Vec<String>,
    /// Extensions without the leading dot. Empty means every file counts.
    extensions: Vec<String>,
}

impl WatchFilter {
    pub fn new<I, E, S, T>(ignore: I, extensions: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let ignore = ignore
            .into_iter()
            .map(|s| s.as_ref().trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let extensions = extensions
            .into_iter()
            .map(|s| s.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { ignore, extensions }
    }

    pub fn from_section(watch: &WatchSection) -> Self {
        Self::new(&watch.ignore, &watch.extensions)
    }

    pub fn has_extension_filter(&self) -> bool {
        !self.extensions.is_empty()
    }

    /// Whether the directory at `rel` (relative to the root, `depth` levels
    /// down) must not be descended into. The root itself is never skipped.
    pub fn skip_dir(&self, rel: &str, name: &str, depth: usize) -> bool {
        if depth == 0 {
            return false;
        }
        if name.starts_with('.') {
            return true;
        }
        self.ignore.iter().any(|entry| entry == name || entry == rel)
    }

    /// Whether a file with this name counts towards a change.
    pub fn accepts_file(&self, name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        match Path::new(name).extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy();
                self.extensions.iter().any(|want| *want == ext)
            }
            None => false,
        }
    }
}

/// `path` relative to `root` with forward slashes, or `None` when it is
/// not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
