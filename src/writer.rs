//! ==============================================================================
//! writer.rs - ingest & rotation writer
//! ==============================================================================
//!
//! purpose:
//!     appends one reading at a time to the current segment file and rolls over
//!     to a new segment once the current one holds `lines_per_file` records.
//!
//! state:
//!     `current_index` / `current_lines` describe the last line that was
//!     successfully written. they only move after the append hit the disk, so a
//!     failed append never leaves them ahead of the file contents.
//!
//! relationships:
//!     - used by: web.rs (one shared writer behind a mutex, called on the
//!       blocking pool)
//!     - uses: segment.rs (file naming, discovery for recovery)
//!
//! rotation rule:
//!     the line counter is bumped first; if it would exceed `lines_per_file`
//!     the record becomes line 1 of segment `current_index + 1`. so every
//!     closed segment holds exactly `lines_per_file` lines and the record that
//!     triggers the rotation lands in the NEW segment.
//!
//! ==============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::StorageConfig;
use crate::domain::{AppendReceipt, Record};
use crate::error::{Result, StoreError};
use crate::segment::SegmentLayout;

#[derive(Debug)]
pub struct SegmentWriter {
    layout: SegmentLayout,
    lines_per_file: u64,
    current_index: u64,
    current_lines: u64,
}

impl SegmentWriter {
    /// a writer that starts at segment 0 with no lines, whatever is on disk
    pub fn new(layout: SegmentLayout, lines_per_file: u64) -> Self {
        Self {
            layout,
            lines_per_file: lines_per_file.max(1),
            current_index: 0,
            current_lines: 0,
        }
    }

    /// writer for the configured storage; only scans disk when
    /// `resume_on_start` is set
    pub fn from_config(storage: &StorageConfig) -> Result<Self> {
        let layout = SegmentLayout::from_config(storage);
        if storage.resume_on_start {
            Self::resume(layout, storage.lines_per_file)
        } else {
            Ok(Self::new(layout, storage.lines_per_file))
        }
    }

    /// a writer positioned after the last record of the newest segment on disk
    ///
    /// a missing data directory counts as empty. appends into it still fail
    /// until somebody creates it.
    pub fn resume(layout: SegmentLayout, lines_per_file: u64) -> Result<Self> {
        let mut writer = Self::new(layout, lines_per_file);
        if !writer.layout.dir().exists() {
            return Ok(writer);
        }

        if let Some(last) = writer.layout.list()?.pop() {
            let bytes = std::fs::read(&last.path).map_err(|e| StoreError::io(&last.path, e))?;
            // a crash mid-append leaves a line without its newline; close it so
            // the next record does not get glued onto it
            if bytes.last().is_some_and(|b| *b != b'\n') {
                tracing::warn!(path = %last.path.display(), "terminating torn last line");
                append_line(&last.path, "\n")?;
            }
            writer.current_index = last.index;
            writer.current_lines = count_lines(&bytes);
            tracing::info!(
                file = %writer.layout.file_name(last.index),
                lines = writer.current_lines,
                "resuming segment writer"
            );
        }
        Ok(writer)
    }

    /// (segment index, lines written to it)
    pub fn position(&self) -> (u64, u64) {
        (self.current_index, self.current_lines)
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// stamp `value` with the current time and append it
    pub fn append(&mut self, value: f64) -> Result<AppendReceipt> {
        self.append_at(value, Utc::now())
    }

    pub fn append_at(&mut self, value: f64, at: DateTime<Utc>) -> Result<AppendReceipt> {
        let record = Record {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            value,
        };
        let (index, line_number) = self.next_position();
        let path = self.layout.path(index);

        append_line(&path, &record.to_line())?;

        if index != self.current_index {
            tracing::info!(file = %self.layout.file_name(index), "rotated to new segment");
        }
        self.current_index = index;
        self.current_lines = line_number;

        Ok(AppendReceipt {
            timestamp: record.timestamp,
            value: record.value,
            segment_index: index,
            file: self.layout.file_name(index),
            line_number,
        })
    }

    fn next_position(&self) -> (u64, u64) {
        let line = self.current_lines + 1;
        if line > self.lines_per_file {
            (self.current_index + 1, 1)
        } else {
            (self.current_index, line)
        }
    }
}

/// one open, one write, one close
fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(line.as_bytes()).map_err(|e| StoreError::io(path, e))
}

/// non-empty lines, the same rule the reader uses
fn count_lines(bytes: &[u8]) -> u64 {
    bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(|b| b.is_ascii_whitespace()))
        .count() as u64
}
