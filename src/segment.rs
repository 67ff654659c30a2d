//! ==============================================================================
//! segment.rs - segment file naming and discovery
//! ==============================================================================
//!
//! purpose:
//!     a segment is one append-only text file holding a bounded number of
//!     records. this module owns the filename scheme
//!     `<prefix>_<index>.<extension>` and turns a directory listing back into
//!     an ordered list of segments.
//!
//! relationships:
//!     - used by: writer.rs (target path for appends, startup recovery)
//!     - used by: reader.rs (which files to scan, in which order)
//!
//! ordering:
//!     segments are sorted by their NUMERIC index. a plain string sort would put
//!     `_10` before `_2` as soon as there are ten segments.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::{Result, StoreError};

#[derive(Clone, Debug)]
pub struct SegmentLayout {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

/// a segment found on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentFile {
    pub index: u64,
    pub path: PathBuf,
}

impl SegmentLayout {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.data_dir, &storage.file_prefix, &storage.file_extension)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self, index: u64) -> String {
        format!("{}_{}.{}", self.prefix, index, self.extension)
    }

    pub fn path(&self, index: u64) -> PathBuf {
        self.dir.join(self.file_name(index))
    }

    /// index of a segment file name, or None if the name is not one of ours
    pub fn parse_index(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(self.prefix.as_str())?.strip_prefix('_')?;
        let digits = rest.strip_suffix(self.extension.as_str())?.strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// all segments in the directory, oldest first
    ///
    /// fails only when the directory itself cannot be listed.
    pub fn list(&self) -> Result<Vec<SegmentFile>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let mut segments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(index) = self.parse_index(name) {
                segments.push(SegmentFile { index, path: entry.path() });
            }
        }

        segments.sort_by_key(|s| s.index);
        Ok(segments)
    }
}
