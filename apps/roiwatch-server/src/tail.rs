//! Reading the CSV detection log written by the camera pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use roiwatch_core::{DetectionEvent, ViolationFlag};
use serde::Serialize;
use tracing::{debug, warn};

/// One row of the detection log, keyed by the log's own column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LogRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Class")]
    pub class: String,
    /// Fraction in [0, 1] as written by the detector.
    #[serde(rename = "Confidence")]
    pub confidence: String,
    #[serde(rename = "Restricted Area Violation")]
    pub violation: String,
}

impl LogRow {
    fn from_record(record: &csv::StringRecord) -> Self {
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        Self {
            timestamp: field(0),
            class: field(1),
            confidence: field(2),
            violation: field(3),
        }
    }

    /// Converts the row into a detection event with a percentage confidence
    /// rounded to two decimals.
    ///
    /// Every row maps to exactly one event so frame offsets stay aligned with
    /// log rows: an unreadable confidence becomes 0 and any violation text
    /// other than yes/true counts as no violation.
    pub fn to_event(&self) -> DetectionEvent {
        let confidence = match self.confidence.parse::<f64>() {
            Ok(c) if c.is_finite() => (c * 100.0 * 100.0).round() / 100.0,
            _ => {
                warn!(
                    timestamp = %self.timestamp,
                    class = %self.class,
                    raw = %self.confidence,
                    "unreadable confidence in detection log; using 0"
                );
                0.0
            }
        };
        let is_violation = self
            .violation
            .parse::<ViolationFlag>()
            .map(|f| f.0)
            .unwrap_or(false);
        DetectionEvent::new(&self.timestamp, &self.class, confidence, is_violation)
    }
}

/// Rows parsed out of one read of the log.
#[derive(Debug, Default)]
pub(crate) struct TailRead {
    /// Complete rows at or after the requested cursor.
    pub rows: Vec<LogRow>,
    /// Number of complete rows in the whole log.
    pub total: u64,
}

/// Parses complete lines of `content`, skipping the first `skip` data rows.
///
/// A trailing line without a newline is still being written and is left for
/// the next read.
pub(crate) fn parse_rows(content: &str, skip: u64) -> Result<TailRead> {
    let complete = match content.rfind('\n') {
        Some(idx) => &content[..=idx],
        None => "",
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(complete.as_bytes());
    let mut out = TailRead::default();
    for record in reader.records() {
        let record = record.context("reading detection log record")?;
        if out.total >= skip {
            out.rows.push(LogRow::from_record(&record));
        }
        out.total += 1;
    }
    Ok(out)
}

/// Reads the log at `path`. A missing file reads as empty.
pub(crate) async fn read_log(path: &Path, skip: u64) -> Result<TailRead> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_rows(&content, skip),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "detection log not found yet");
            Ok(TailRead::default())
        }
        Err(err) => {
            Err(err).with_context(|| format!("reading detection log {}", path.display()))
        }
    }
}
