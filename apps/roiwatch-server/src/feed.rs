use std::time::Duration;

use anyhow::Result;
use roiwatch_core::{AggregateStore, BatchFrame, FeedSummary, RecentLog};
use roiwatch_otel::FEED_TARGET;
use roiwatch_topics::{TOPIC_DETECTIONS_BATCH, TOPIC_FEED_RESET};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::tail::{self, LogRow};
use crate::AppState;

const TOP_VIOLATIONS: usize = 5;

/// Server-side view of the detection log: how far it has been read and a
/// tally of every row read so far.
///
/// The tally counts raw rows, so a violation whose timestamp the dashboard
/// cannot bucket still shows up in the feed-wide totals.
pub(crate) struct FeedState {
    tally: AggregateStore,
    violation_rows: u64,
    recent_violations: RecentLog,
    consumed: u64,
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            tally: AggregateStore::new(),
            violation_rows: 0,
            recent_violations: RecentLog::new(TOP_VIOLATIONS),
            consumed: 0,
        }
    }

    /// Number of log rows already turned into frames.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn summary(&self) -> FeedSummary {
        FeedSummary::from_tally(&self.tally, self.violation_rows, &self.recent_violations)
    }

    pub fn reset(&mut self) {
        *self = FeedState::new();
    }

    /// Tallies freshly appended rows and returns them as a frame starting at
    /// the current cursor.
    pub fn ingest(&mut self, rows: &[LogRow]) -> BatchFrame {
        let events: Vec<_> = rows.iter().map(LogRow::to_event).collect();
        for event in &events {
            self.tally.record_detection(&event.class, event.confidence);
            if event.is_violation {
                self.violation_rows += 1;
                self.recent_violations.push(event.clone());
            }
        }
        let frame = BatchFrame::from_events(self.consumed, &events);
        self.consumed += rows.len() as u64;
        frame.with_summary(self.summary())
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads rows appended since the last poll and publishes them as one frame.
pub(crate) async fn poll_once(state: &AppState) -> Result<Option<BatchFrame>> {
    let mut feed = state.feed.lock().await;
    let read = tail::read_log(&state.log_path, feed.consumed()).await?;
    if read.total < feed.consumed() {
        warn!(
            target: FEED_TARGET,
            path = %state.log_path.display(),
            rows = read.total,
            consumed = feed.consumed(),
            "detection log shrank; restarting feed from the first row"
        );
        feed.reset();
        state.bus.publish(TOPIC_FEED_RESET, &json!({"rows": read.total}));
        return Ok(None);
    }
    if read.rows.is_empty() {
        return Ok(None);
    }
    let frame = feed.ingest(&read.rows);
    debug!(
        target: FEED_TARGET,
        offset = frame.offset,
        rows = frame.len(),
        subscribers = state.bus.receiver_count(),
        "publishing detection batch"
    );
    state.bus.publish(TOPIC_DETECTIONS_BATCH, &frame);
    Ok(Some(frame))
}

pub(crate) async fn run(state: AppState, every: Duration) {
    info!(
        path = %state.log_path.display(),
        every_ms = every.as_millis() as u64,
        "detection feed started"
    );
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = poll_once(&state).await {
            warn!(target: FEED_TARGET, "detection feed poll failed: {err:#}");
        }
    }
}
