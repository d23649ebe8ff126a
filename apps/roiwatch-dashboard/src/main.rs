use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use roiwatch_core::{BatchFrame, ChangeDescriptor, ClockZone, StreamReducer, ViewProjector};
use roiwatch_events::Envelope;
use roiwatch_topics::{TOPIC_DETECTIONS_BATCH, TOPIC_FEED_RESET};
use serde_json::Value as JsonValue;
use std::io::{BufRead, BufReader, Write};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

mod view;

use view::TerminalView;

#[derive(Debug, Parser)]
#[command(
    name = "roiwatch-dashboard",
    version,
    about = "Terminal dashboard for a live object-detection feed"
)]
struct Args {
    #[arg(long, env = "ROIWATCH_BASE", default_value = "http://127.0.0.1:8000")]
    base: String,
    /// Rows kept in the recent detections log
    #[arg(long, env = "ROIWATCH_LOG_LIMIT", default_value_t = 25)]
    log_limit: usize,
    /// Print the aggregate snapshot as JSON on every update instead of the text view
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Render the first batch and exit
    #[arg(long, default_value_t = false)]
    once: bool,
    /// Log row index to resume from
    #[arg(long)]
    last_event_id: Option<u64>,
    /// Wall clock used to bucket violations: local, UTC or +HH:MM
    #[arg(long, env = "ROIWATCH_UTC_OFFSET", default_value = "local", value_parser = parse_zone)]
    utc_offset: ClockZone,
}

fn parse_zone(raw: &str) -> Result<ClockZone, String> {
    ClockZone::parse(raw).ok_or_else(|| format!("expected local, UTC or +HH:MM, got {raw:?}"))
}

#[derive(Debug, PartialEq, Eq)]
enum FrameOutcome {
    Applied,
    Duplicate,
    /// Rows between the cursor and the frame were never delivered.
    Gap { cursor: u64, offset: u64 },
    /// The feed ends before the cursor; the log it serves is not the one the
    /// cursor came from.
    Rewound { cursor: u64, end: u64 },
}

#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Disconnected,
    Resync,
    Done,
}

/// One dashboard session: the reducer owns the aggregates for the lifetime of
/// the process, across reconnects.
struct Session<W> {
    reducer: StreamReducer,
    view: TerminalView<W>,
    /// Log row index of the next row expected from the feed.
    cursor: u64,
}

impl<W: Write> Session<W> {
    fn new(zone: ClockZone, view: TerminalView<W>, cursor: u64) -> Self {
        Self {
            reducer: StreamReducer::new(zone),
            view,
            cursor,
        }
    }

    fn apply_frame(&mut self, frame: BatchFrame) -> Result<FrameOutcome> {
        if frame.offset > self.cursor {
            return Ok(FrameOutcome::Gap {
                cursor: self.cursor,
                offset: frame.offset,
            });
        }
        if frame.is_empty() && frame.offset < self.cursor {
            let outcome = FrameOutcome::Rewound {
                cursor: self.cursor,
                end: frame.offset,
            };
            self.cursor = 0;
            return Ok(outcome);
        }
        let summary = frame.summary.clone();
        if frame.is_empty() {
            self.view
                .project(&ChangeDescriptor::default(), self.reducer.store(), summary.as_ref())
                .context("rendering dashboard")?;
            return Ok(FrameOutcome::Applied);
        }
        let Some(frame) = frame.trim_before(self.cursor)? else {
            return Ok(FrameOutcome::Duplicate);
        };
        self.cursor = frame.end();
        let change = self.reducer.reduce_batch(frame.into_events()?);
        self.view
            .project(&change, self.reducer.store(), summary.as_ref())
            .context("rendering dashboard")?;
        Ok(FrameOutcome::Applied)
    }

    fn handle_event(&mut self, event_name: &str, data: &str) -> Result<Option<FrameOutcome>> {
        match event_name {
            TOPIC_DETECTIONS_BATCH => {
                let env: JsonValue = serde_json::from_str(data).context("decode SSE payload")?;
                // Accept both {kind,payload} envelopes and bare frames.
                let payload = match serde_json::from_value::<Envelope>(env.clone()) {
                    Ok(envelope) => envelope.payload,
                    Err(_) => env,
                };
                let frame: BatchFrame =
                    serde_json::from_value(payload).context("decode detection frame")?;
                self.apply_frame(frame).map(Some)
            }
            TOPIC_FEED_RESET => {
                info!("detection log was reset upstream; following it from the first row");
                self.cursor = 0;
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

fn stream_frames_once<W: Write>(
    client: &Client,
    base: &str,
    session: &mut Session<W>,
    once: bool,
) -> Result<StreamEnd> {
    let req = client
        .get(format!("{}/events", base.trim_end_matches('/')))
        .header(ACCEPT, "text/event-stream")
        .header("Last-Event-ID", session.cursor.to_string());
    let resp = req.send().context("connecting to events stream")?;
    if !resp.status().is_success() {
        bail!("events stream failed: {}", resp.status());
    }
    let mut reader = BufReader::new(resp);
    let mut line = String::new();
    let mut event_name = String::new();
    let mut data_buf = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Ok(StreamEnd::Disconnected);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        if line.is_empty() {
            if !data_buf.is_empty() {
                match session.handle_event(&event_name, &data_buf) {
                    Ok(Some(FrameOutcome::Gap { cursor, offset })) => {
                        warn!(cursor, offset, "missed detection rows; resyncing");
                        return Ok(StreamEnd::Resync);
                    }
                    Ok(Some(FrameOutcome::Rewound { cursor, end })) => {
                        warn!(
                            cursor,
                            end,
                            "feed is behind the resume cursor; replaying it from the first row"
                        );
                        return Ok(StreamEnd::Resync);
                    }
                    Ok(Some(FrameOutcome::Applied)) if once => return Ok(StreamEnd::Done),
                    Ok(_) => {}
                    Err(err) => warn!("failed to process detection frame: {err:#}"),
                }
            }
            event_name.clear();
            data_buf.clear();
            continue;
        }
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = rest.trim().to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data_buf.is_empty() {
                data_buf.push('\n');
            }
            data_buf.push_str(rest.trim_start());
            continue;
        }
    }
}

fn main() -> Result<()> {
    roiwatch_otel::init();
    let args = Args::parse();
    let client = Client::builder()
        .timeout(None)
        .build()
        .context("client build")?;
    let base = args.base.trim_end_matches('/').to_string();
    let view = TerminalView::new(std::io::stdout(), args.log_limit, args.json);
    let mut session = Session::new(args.utc_offset, view, args.last_event_id.unwrap_or(0));
    let mut backoff = 1u64;
    loop {
        match stream_frames_once(&client, &base, &mut session, args.once) {
            Ok(StreamEnd::Done) => return Ok(()),
            Ok(StreamEnd::Resync) => {
                backoff = 1;
                continue;
            }
            Ok(StreamEnd::Disconnected) => {
                backoff = 1;
            }
            Err(err) => {
                warn!(backoff_secs = backoff, "stream error: {err:#}");
                backoff = (backoff * 2).min(30);
            }
        }
        thread::sleep(Duration::from_secs(backoff));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roiwatch_core::{DetectionEvent, FeedSummary};
    use serde_json::json;

    fn session() -> Session<Vec<u8>> {
        Session::new(ClockZone::utc(), TerminalView::new(Vec::new(), 5, true), 0)
    }

    fn frame(offset: u64, classes: &[&str]) -> BatchFrame {
        let events: Vec<_> = classes
            .iter()
            .map(|c| DetectionEvent::new("2024-05-01 09:00:00", *c, 50.0, true))
            .collect();
        BatchFrame::from_events(offset, &events)
    }

    #[test]
    fn frames_advance_the_cursor() {
        let mut s = session();
        assert_eq!(s.apply_frame(frame(0, &["car", "car"])).unwrap(), FrameOutcome::Applied);
        assert_eq!(s.cursor, 2);
        assert_eq!(s.reducer.store().class_stat("car").unwrap().count, 2);
        assert_eq!(s.reducer.store().snapshot_bucket_counts().morning, 2);
    }

    #[test]
    fn overlapping_frames_are_not_double_counted() {
        let mut s = session();
        s.apply_frame(frame(0, &["car", "car"])).unwrap();
        assert_eq!(s.apply_frame(frame(0, &["car"])).unwrap(), FrameOutcome::Duplicate);
        assert_eq!(s.apply_frame(frame(1, &["car", "bus"])).unwrap(), FrameOutcome::Applied);
        assert_eq!(s.cursor, 3);
        assert_eq!(s.reducer.store().class_stat("car").unwrap().count, 2);
        assert_eq!(s.reducer.store().class_stat("bus").unwrap().count, 1);
    }

    #[test]
    fn gaps_request_a_resync_without_touching_the_store() {
        let mut s = session();
        let outcome = s.apply_frame(frame(4, &["car"])).unwrap();
        assert_eq!(outcome, FrameOutcome::Gap { cursor: 0, offset: 4 });
        assert_eq!(s.reducer.store().total_detections(), 0);
    }

    #[test]
    fn empty_frames_still_render_the_summary() {
        let mut s = session();
        let summary = FeedSummary {
            total_detections: 9,
            ..FeedSummary::default()
        };
        let outcome = s.apply_frame(frame(0, &[]).with_summary(summary)).unwrap();
        assert_eq!(outcome, FrameOutcome::Applied);
        let out = String::from_utf8(s.view.output().clone()).unwrap();
        assert!(out.contains("\"total_detections\":9"), "{out}");
    }

    #[test]
    fn envelopes_and_bare_frames_both_decode() {
        let mut s = session();
        let bare = serde_json::to_string(&frame(0, &["car"])).unwrap();
        let env = json!({
            "time": "2024-05-01T09:00:00.000Z",
            "kind": TOPIC_DETECTIONS_BATCH,
            "payload": frame(1, &["bus"])
        })
        .to_string();
        assert_eq!(
            s.handle_event(TOPIC_DETECTIONS_BATCH, &bare).unwrap(),
            Some(FrameOutcome::Applied)
        );
        assert_eq!(
            s.handle_event(TOPIC_DETECTIONS_BATCH, &env).unwrap(),
            Some(FrameOutcome::Applied)
        );
        assert_eq!(s.cursor, 2);
        assert_eq!(s.handle_event("other", "{}").unwrap(), None);
    }

    #[test]
    fn resume_past_the_end_of_a_shorter_log_replays_it() {
        let mut s = Session::new(ClockZone::utc(), TerminalView::new(Vec::new(), 5, true), 100);
        let outcome = s.apply_frame(frame(3, &[])).unwrap();
        assert_eq!(outcome, FrameOutcome::Rewound { cursor: 100, end: 3 });
        assert_eq!(s.cursor, 0);

        assert_eq!(
            s.apply_frame(frame(0, &["bus", "bus", "bus"])).unwrap(),
            FrameOutcome::Applied
        );
        assert_eq!(s.apply_frame(frame(3, &["car"])).unwrap(), FrameOutcome::Applied);
        assert_eq!(s.cursor, 4);
        assert_eq!(s.reducer.store().class_stat("car").unwrap().count, 1);
        assert_eq!(s.reducer.store().total_detections(), 4);
    }

    #[test]
    fn empty_frame_at_the_cursor_is_not_a_rewind() {
        let mut s = session();
        s.apply_frame(frame(0, &["car", "car"])).unwrap();
        assert_eq!(s.apply_frame(frame(2, &[])).unwrap(), FrameOutcome::Applied);
        assert_eq!(s.cursor, 2);
    }

    #[test]
    fn feed_reset_rewinds_the_cursor_but_keeps_aggregates() {
        let mut s = session();
        s.apply_frame(frame(0, &["car", "car"])).unwrap();
        assert_eq!(s.handle_event(TOPIC_FEED_RESET, "{}").unwrap(), None);
        assert_eq!(s.cursor, 0);
        s.apply_frame(frame(0, &["car"])).unwrap();
        assert_eq!(s.reducer.store().class_stat("car").unwrap().count, 3);
    }

    #[test]
    fn zone_argument_is_validated() {
        assert!(parse_zone("+05:30").is_ok());
        assert!(parse_zone("somewhere").is_err());
    }
}
