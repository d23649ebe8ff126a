//! Canonical event topic constants shared by the feed server and its consumers.
//!
//! Keep this list alphabetized and favor dot.case names.

/// One batch of newly logged detections (payload: `roiwatch_core::BatchFrame`).
pub const TOPIC_DETECTIONS_BATCH: &str = "detections.batch";
/// The detection log shrank and the feed restarted from row 0.
pub const TOPIC_FEED_RESET: &str = "detections.feed.reset";
