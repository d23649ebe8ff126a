use std::io::{self, Write};

use chrono::Local;
use roiwatch_core::{
    pie_slices, AggregateStore, ChangeDescriptor, FeedSummary, RecentLog, ViewProjector,
};
use serde_json::json;

const BAR_WIDTH: usize = 30;

/// Text rendering of the dashboard: summary line, confidence bars, violation
/// pie and the newest rows of the detection log.
pub struct TerminalView<W> {
    out: W,
    log: RecentLog,
    json: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, log_limit: usize, json: bool) -> Self {
        Self {
            out,
            log: RecentLog::new(log_limit),
            json,
        }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    fn render_json(
        &mut self,
        change: &ChangeDescriptor,
        store: &AggregateStore,
        summary: Option<&FeedSummary>,
    ) -> io::Result<()> {
        let doc = json!({
            "snapshot": store.snapshot(),
            "summary": summary,
            "change": change,
        });
        writeln!(self.out, "{}", serde_json::to_string(&doc)?)
    }

    fn render_text(
        &mut self,
        change: &ChangeDescriptor,
        store: &AggregateStore,
        summary: Option<&FeedSummary>,
    ) -> io::Result<()> {
        let now = Local::now().format("%H:%M:%S");
        let (detections, violations, top) = match summary {
            Some(s) => (
                s.total_detections,
                s.total_violations,
                s.most_frequent_class.clone(),
            ),
            None => (
                store.total_detections(),
                store.total_violations(),
                store.most_frequent_class().map(str::to_string),
            ),
        };
        let bucket = change
            .updated_bucket
            .map(|b| format!(" bucket={b}"))
            .unwrap_or_default();
        writeln!(
            self.out,
            "[{}] detections={} violations={} most_frequent={} (+{} rows{})",
            now,
            detections,
            violations,
            top.as_deref().unwrap_or("-"),
            change.new_rows.len(),
            bucket
        )?;
        for skipped in &change.skipped {
            writeln!(
                self.out,
                "  skipped #{} {}: {}",
                skipped.index, skipped.class, skipped.reason
            )?;
        }

        writeln!(self.out, "Average confidence (%)")?;
        let averages = store.snapshot_class_averages();
        let name_width = averages.iter().map(|c| c.class.len()).max().unwrap_or(0);
        for row in &averages {
            let marker = if change.updated_classes.contains(&row.class) {
                '*'
            } else {
                ' '
            };
            writeln!(
                self.out,
                " {marker}{:<name_width$}  {}  {:>6.2}  (n={})",
                row.class,
                bar(row.average),
                row.average,
                row.count
            )?;
        }

        writeln!(self.out, "Violations by time of day")?;
        for slice in pie_slices(&store.snapshot_bucket_counts()) {
            writeln!(
                self.out,
                "  {:<26}{:>6}  {:>5.1}%",
                slice.legend,
                slice.count,
                slice.share * 100.0
            )?;
        }

        if self.log.capacity() > 0 {
            writeln!(self.out, "Recent detections")?;
            for row in self.log.newest_first() {
                writeln!(
                    self.out,
                    "  {}  {}  {:.2}%  {}",
                    row.timestamp, row.class, row.confidence, row.is_violation
                )?;
            }
        }
        self.out.flush()
    }
}

fn bar(average: f64) -> String {
    let filled = ((average / 100.0) * BAR_WIDTH as f64)
        .round()
        .clamp(0.0, BAR_WIDTH as f64) as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

impl<W: Write> ViewProjector for TerminalView<W> {
    type Error = io::Error;

    fn project(
        &mut self,
        change: &ChangeDescriptor,
        store: &AggregateStore,
        summary: Option<&FeedSummary>,
    ) -> io::Result<()> {
        self.log.extend(change.new_rows.iter().cloned());
        if self.json {
            self.render_json(change, store, summary)
        } else {
            self.render_text(change, store, summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiwatch_core::{ClockZone, DetectionEvent, StreamReducer};

    fn reduce(events: Vec<DetectionEvent>) -> (StreamReducer, ChangeDescriptor) {
        let mut reducer = StreamReducer::new(ClockZone::utc());
        let change = reducer.reduce_batch(events);
        (reducer, change)
    }

    #[test]
    fn bars_scale_and_clamp() {
        assert_eq!(bar(0.0), ".".repeat(BAR_WIDTH));
        assert_eq!(bar(50.0), format!("{}{}", "#".repeat(15), ".".repeat(15)));
        assert_eq!(bar(180.0), "#".repeat(BAR_WIDTH));
        assert_eq!(bar(-5.0), ".".repeat(BAR_WIDTH));
    }

    #[test]
    fn text_view_lists_classes_buckets_and_newest_rows_first() {
        let (reducer, change) = reduce(vec![
            DetectionEvent::new("2024-05-01 07:00:00", "car", 80.0, false),
            DetectionEvent::new("2024-05-01 07:05:00", "car", 90.0, true),
        ]);
        let mut view = TerminalView::new(Vec::new(), 10, false);
        view.project(&change, reducer.store(), None).unwrap();
        let text = String::from_utf8(view.output().clone()).unwrap();

        assert!(text.contains("detections=2 violations=1 most_frequent=car"), "{text}");
        assert!(text.contains("bucket=morning"), "{text}");
        assert!(text.contains(" 85.00  (n=2)"), "{text}");
        assert!(text.contains("Morning (6 AM - 12 PM)"), "{text}");
        assert!(text.contains("100.0%"), "{text}");
        let newest = text.find("07:05:00  car  90.00%  true").expect("newest row");
        let oldest = text.find("07:00:00  car  80.00%  false").expect("oldest row");
        assert!(newest < oldest);
    }

    #[test]
    fn feed_summary_overrides_local_totals() {
        let (reducer, change) = reduce(vec![DetectionEvent::new(
            "2024-05-01 20:00:00",
            "person",
            60.0,
            true,
        )]);
        let summary = FeedSummary {
            total_detections: 40,
            total_violations: 12,
            most_frequent_class: Some("helmet".into()),
            top_5_violations: Vec::new(),
        };
        let mut view = TerminalView::new(Vec::new(), 0, false);
        view.project(&change, reducer.store(), Some(&summary)).unwrap();
        let text = String::from_utf8(view.output().clone()).unwrap();
        assert!(text.contains("detections=40 violations=12 most_frequent=helmet"), "{text}");
        assert!(!text.contains("Recent detections"));
    }

    #[test]
    fn json_view_emits_one_document_per_batch() {
        let (reducer, change) = reduce(vec![DetectionEvent::new(
            "2024-05-01 13:00:00",
            "car",
            70.0,
            true,
        )]);
        let mut view = TerminalView::new(Vec::new(), 5, true);
        view.project(&change, reducer.store(), None).unwrap();
        let text = String::from_utf8(view.output().clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
        let doc: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(doc["snapshot"]["buckets"]["afternoon"], 1);
        assert_eq!(doc["change"]["updated_bucket"], "afternoon");
        assert!(doc["summary"].is_null());
    }
}
