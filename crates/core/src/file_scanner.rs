//! File scanning utilities
//!
//! Walks a directory tree and returns the files whose full path matches a
//! shell-style glob, optionally restricted to recently modified files.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// `*` and `?` may match `/`, so `*/build/outputs/apk/*.apk` reaches nested
/// flavor directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// File scanner with configurable filters
pub struct FileScanner {
    root: PathBuf,
    pattern: Option<Pattern>,
    modified_since: Option<SystemTime>,
}

impl FileScanner {
    /// Create a new file scanner rooted at the given path
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: None,
            modified_since: None,
        }
    }

    /// Only keep files whose full path matches `pattern`
    pub fn matching(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    /// Only keep files modified at or after `since`; `None` disables the filter
    pub fn modified_since(mut self, since: Option<SystemTime>) -> Self {
        self.modified_since = since;
        self
    }

    /// Scan and return matching files, sorted by path
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::directory_not_found(&self.root));
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.path_matches(path) {
                continue;
            }

            if let Some(since) = self.modified_since {
                let modified = match entry.metadata().map(|m| m.modified()) {
                    Ok(Ok(modified)) => modified,
                    Ok(Err(err)) => {
                        tracing::warn!(path = %path.display(), error = %err, "No modification time");
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "No metadata");
                        continue;
                    }
                };
                if modified < since {
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    fn path_matches(&self, path: &Path) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |p| p.matches_path_with(path, MATCH_OPTIONS))
    }
}
