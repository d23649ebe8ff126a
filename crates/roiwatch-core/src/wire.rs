//! Column-oriented batch frames as pushed by the detection feed.
//!
//! A frame carries four parallel arrays (`timestamp`, `class`, `confidence`,
//! `restricted_area_violation`) plus the log offset of its first row and an
//! optional feed-wide summary.

use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::event::DetectionEvent;
use crate::log::RecentLog;
use crate::store::AggregateStore;

/// Restricted-area flag; accepts booleans and `Yes`/`No` strings on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViolationFlag(pub bool);

impl FromStr for ViolationFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(ViolationFlag(true)),
            "no" | "false" => Ok(ViolationFlag(false)),
            _ => Err(Error::InvalidViolationFlag { raw: s.to_string() }),
        }
    }
}

impl Serialize for ViolationFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

impl<'de> Deserialize<'de> for ViolationFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(ViolationFlag(b)),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// Feed-wide totals computed by the producer over the whole detection log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub total_detections: u64,
    pub total_violations: u64,
    pub most_frequent_class: Option<String>,
    /// Most recent violations, oldest first.
    #[serde(default)]
    pub top_5_violations: Vec<DetectionEvent>,
}

impl FeedSummary {
    /// Summary over a tally of log rows. `total_violations` is passed in
    /// because violation rows count here even when their timestamp cannot be
    /// bucketed.
    pub fn from_tally(
        store: &AggregateStore,
        total_violations: u64,
        recent_violations: &RecentLog,
    ) -> Self {
        Self {
            total_detections: store.total_detections(),
            total_violations,
            most_frequent_class: store.most_frequent_class().map(str::to_string),
            top_5_violations: recent_violations.oldest_first().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchFrame {
    /// Detection log index of the first row in this frame.
    #[serde(default)]
    pub offset: u64,
    pub timestamp: Vec<String>,
    pub class: Vec<String>,
    pub confidence: Vec<f64>,
    pub restricted_area_violation: Vec<ViolationFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<FeedSummary>,
}

impl BatchFrame {
    pub fn from_events(offset: u64, events: &[DetectionEvent]) -> Self {
        let mut frame = BatchFrame {
            offset,
            ..BatchFrame::default()
        };
        for ev in events {
            frame.timestamp.push(ev.timestamp.clone());
            frame.class.push(ev.class.clone());
            frame.confidence.push(ev.confidence);
            frame
                .restricted_area_violation
                .push(ViolationFlag(ev.is_violation));
        }
        frame
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn with_summary(mut self, summary: FeedSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// Log index one past the last row of this frame.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len() as u64)
    }

    fn check_shape(&self) -> Result<()> {
        let n = self.timestamp.len();
        if self.class.len() != n
            || self.confidence.len() != n
            || self.restricted_area_violation.len() != n
        {
            return Err(Error::FrameShape {
                timestamps: n,
                classes: self.class.len(),
                confidences: self.confidence.len(),
                violations: self.restricted_area_violation.len(),
            });
        }
        if self.offset.checked_add(n as u64).is_none() {
            return Err(Error::OffsetOverflow {
                offset: self.offset,
                rows: n,
            });
        }
        Ok(())
    }

    /// Drops rows that sit before `cursor` in the log. Returns `None` when the
    /// whole frame was already seen.
    pub fn trim_before(mut self, cursor: u64) -> Result<Option<Self>> {
        self.check_shape()?;
        if self.end() <= cursor {
            return Ok(None);
        }
        if self.offset < cursor {
            let drop = (cursor - self.offset) as usize;
            self.timestamp.drain(..drop);
            self.class.drain(..drop);
            self.confidence.drain(..drop);
            self.restricted_area_violation.drain(..drop);
            self.offset = cursor;
        }
        Ok(Some(self))
    }

    pub fn into_events(self) -> Result<Vec<DetectionEvent>> {
        self.check_shape()?;
        Ok(self
            .timestamp
            .into_iter()
            .zip(self.class)
            .zip(self.confidence)
            .zip(self.restricted_area_violation)
            .map(|(((timestamp, class), confidence), flag)| DetectionEvent {
                timestamp,
                class,
                confidence,
                is_violation: flag.0,
            })
            .collect())
    }
}
