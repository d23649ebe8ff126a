use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bucket::TimeBucket;

/// One classified object observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub timestamp: String,
    pub class: String,
    /// Percentage, nominally in [0, 100]. Stored as received.
    pub confidence: f64,
    pub is_violation: bool,
}

impl DetectionEvent {
    pub fn new(
        timestamp: impl Into<String>,
        class: impl Into<String>,
        confidence: f64,
        is_violation: bool,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            class: class.into(),
            confidence,
            is_violation,
        }
    }
}

/// An event the reducer refused to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEvent {
    /// Position of the event inside its batch.
    pub index: usize,
    pub class: String,
    pub reason: String,
}

/// What one reduced batch changed, for incremental view refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    /// Applied rows in arrival order, most recent last.
    pub new_rows: Vec<DetectionEvent>,
    pub updated_classes: BTreeSet<String>,
    /// Bucket of the last violation applied in the batch.
    pub updated_bucket: Option<TimeBucket>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEvent>,
}

impl ChangeDescriptor {
    pub fn is_empty(&self) -> bool {
        self.new_rows.is_empty() && self.skipped.is_empty()
    }
}
