use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// body of `POST /api/ppm`
///
/// the value is kept as raw json so the handler can tell "missing" apart from
/// "present but not a number" and accept numeric strings like `"412.5"`.
#[derive(Clone, Deserialize, Debug, Default)]
pub struct IngestPayload {
    #[serde(default)]
    pub ppm_lin: Option<serde_json::Value>,
}

impl IngestPayload {
    /// the reading as a finite number, or a validation error
    pub fn value(&self) -> Result<f64> {
        let number = match &self.ppm_lin {
            None | Some(serde_json::Value::Null) => {
                return Err(StoreError::Validation("Missing ppm_lin field in the body".to_string()))
            }
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        number
            .filter(|v| v.is_finite())
            .ok_or_else(|| StoreError::Validation("ppm_lin must be numeric".to_string()))
    }
}

/// one persisted line: `<timestamp>, <value>`
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// ISO-8601 instant, as written by the server
    pub timestamp: String,
    pub value: f64,
}

impl Record {
    /// the exact line appended to a segment file, newline included
    pub fn to_line(&self) -> String {
        format!("{}, {}\n", self.timestamp, self.value)
    }
}

/// where an append landed
#[derive(Clone, Debug, PartialEq)]
pub struct AppendReceipt {
    pub timestamp: String,
    pub value: f64,
    /// zero-based segment index
    pub segment_index: u64,
    /// segment file name (no directory)
    pub file: String,
    /// 1-based line within the segment
    pub line_number: u64,
}

/// success body of `POST /api/ppm`
#[derive(Clone, Serialize, Debug)]
pub struct IngestResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub ppm_lin: f64,
    pub file: String,
    #[serde(rename = "lineNumber")]
    pub line_number: u64,
}

impl From<AppendReceipt> for IngestResponse {
    fn from(r: AppendReceipt) -> Self {
        Self {
            status: "OK",
            timestamp: r.timestamp,
            ppm_lin: r.value,
            file: r.file,
            line_number: r.line_number,
        }
    }
}

/// one element of the `GET /data` array
///
/// `ppm` is NaN for unparsable stored values; serde_json writes that as `null`.
#[derive(Clone, Serialize, Debug)]
pub struct SeriesPoint {
    /// local date, `DD-MM-YYYY`
    pub date: String,
    /// local time, `HH:MM`
    pub time: String,
    pub ppm: f64,
}
