//! ==============================================================================
//! reader.rs - series reader
//! ==============================================================================
//!
//! purpose:
//!     rebuilds the time-ordered series from every segment on disk.
//!     each call lists the data directory, reads every segment in index order
//!     and parses every line. there is no cache and no index: cost grows with
//!     the whole history, which is fine for a dashboard refresh.
//!
//! tolerance:
//!     stored lines are never trusted to be well formed.
//!     - blank lines are skipped
//!     - the value is the number leading the field (`412.5 ppm` -> 412.5);
//!       no leading number gives NaN (serialised as null)
//!     - a timestamp that does not parse leaves date/time empty
//!     - a segment that vanished or cannot be read is skipped with a warning
//!     only a directory that cannot be listed fails the read.
//!
//! relationships:
//!     - used by: web.rs (`GET /data`, on the blocking pool)
//!     - uses: segment.rs (discovery and ordering)
//!
//! ==============================================================================

use chrono::{DateTime, Local};

use crate::domain::SeriesPoint;
use crate::error::Result;
use crate::segment::SegmentLayout;

#[derive(Debug)]
pub struct Series {
    pub points: Vec<SeriesPoint>,
    /// how many segment files were scanned
    pub segments: usize,
}

/// read everything, then keep only the last `limit` points if one is given
pub fn read_series(layout: &SegmentLayout, limit: Option<usize>) -> Result<Series> {
    let segments = layout.list()?;

    let mut points = Vec::new();
    for segment in &segments {
        let bytes = match std::fs::read(&segment.path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %segment.path.display(), error = %e, "skipping unreadable segment");
                continue;
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        points.extend(
            content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(parse_line),
        );
    }

    if let Some(limit) = limit.filter(|l| *l > 0) {
        let excess = points.len().saturating_sub(limit);
        points.drain(..excess);
    }

    Ok(Series { points, segments: segments.len() })
}

/// `<timestamp>, <value>` -> point in local time
pub fn parse_line(line: &str) -> SeriesPoint {
    let (ts, value) = match line.split_once(',') {
        Some((ts, value)) => (ts.trim(), value.trim()),
        None => (line.trim(), ""),
    };

    // older logs may hold unvalidated text after the number, or more commas
    let ppm = leading_float(value.split(',').next().unwrap_or(""));

    match DateTime::parse_from_rfc3339(ts) {
        Ok(instant) => {
            let local = instant.with_timezone(&Local);
            SeriesPoint {
                date: local.format("%d-%m-%Y").to_string(),
                time: local.format("%H:%M").to_string(),
                ppm,
            }
        }
        Err(_) => SeriesPoint { date: String::new(), time: String::new(), ppm },
    }
}

/// longest float at the start of `s`: sign, digits, fraction, exponent
///
/// `"412.5 ppm"` gives 412.5, `"7e"` gives 7, `"-Infinity"` gives -inf.
/// NaN when no digit leads the text.
fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let b = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if b[0] == b'-' { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let int_end = digits_from(end);
    let mut mantissa = int_end - end;
    end = int_end;
    if b.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa == 0 {
        return f64::NAN;
    }

    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(b.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// integer-prefix parse of the `limit` query value
///
/// `"25"` and `"25abc"` give 25. anything that does not start with a positive
/// integer (including `"0"` and `"-3"`) means "no truncation".
pub fn parse_limit(raw: Option<&str>) -> Option<usize> {
    let raw = raw?.trim_start();
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    match digits[..end].parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
