use std::collections::HashMap;

use anyhow::Result;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use roiwatch_core::BatchFrame;
use roiwatch_events::Envelope;
use roiwatch_topics::{TOPIC_DETECTIONS_BATCH, TOPIC_FEED_RESET};
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::StreamExt as _;
use tracing::warn;

use crate::tail::{self, LogRow};
use crate::AppState;

fn resume_cursor(q: &HashMap<String, String>, headers: &HeaderMap) -> u64 {
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    q.get("after")
        .cloned()
        .or(last_event_id)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Rows `[after, consumed)` of the log as one frame, read while holding the
/// feed lock so no live frame can slip between replay and subscription.
async fn replay_frame(state: &AppState, after: u64) -> Result<BatchFrame> {
    let feed = state.feed.lock().await;
    let consumed = feed.consumed();
    if after >= consumed {
        let frame = BatchFrame {
            offset: consumed,
            ..BatchFrame::default()
        };
        return Ok(frame.with_summary(feed.summary()));
    }
    let read = tail::read_log(&state.log_path, after).await?;
    let take = ((consumed - after) as usize).min(read.rows.len());
    let events: Vec<_> = read.rows[..take].iter().map(LogRow::to_event).collect();
    Ok(BatchFrame::from_events(after, &events).with_summary(feed.summary()))
}

fn envelope_for(time: String, kind: &str, frame: &BatchFrame) -> Option<Envelope> {
    Some(Envelope {
        time,
        kind: kind.to_string(),
        payload: serde_json::to_value(frame).ok()?,
    })
}

/// Server-sent events carrying detection batches.
///
/// Each event id is the log row index after the frame's last row, so a client
/// reconnecting with `Last-Event-ID` (or `?after=`) resumes without gaps.
pub async fn events_sse(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let after = resume_cursor(&q, &headers);
    let (tx, rx) = tokio::sync::mpsc::channel::<(Envelope, u64)>(128);
    // Subscribe before replaying; the cursor drops anything the replay covered.
    let mut bus_rx = state.bus.subscribe();
    let replay = match replay_frame(&state, after).await {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(after, "detection replay failed: {err:#}");
            None
        }
    };
    let mut cursor = replay.as_ref().map(BatchFrame::end).unwrap_or(after);

    tokio::spawn(async move {
        if let Some(frame) = replay {
            let env = Envelope::new(TOPIC_DETECTIONS_BATCH, &frame);
            if tx.send((env, frame.end())).await.is_err() {
                return;
            }
        }
        loop {
            let env = match bus_rx.recv().await {
                Ok(env) => env,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "sse subscriber lagged behind the detection feed");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let outgoing = if env.kind == TOPIC_DETECTIONS_BATCH {
                let frame = match serde_json::from_value::<BatchFrame>(env.payload) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!("dropping undecodable detection frame: {err}");
                        continue;
                    }
                };
                let frame = match frame.trim_before(cursor) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("dropping malformed detection frame: {err}");
                        continue;
                    }
                };
                cursor = frame.end();
                match envelope_for(env.time, &env.kind, &frame) {
                    Some(env) => (env, cursor),
                    None => continue,
                }
            } else {
                if env.kind == TOPIC_FEED_RESET {
                    cursor = 0;
                }
                (env, cursor)
            };
            if tx.send(outgoing).await.is_err() {
                break;
            }
        }
    });

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|(env, id)| {
        let data = serde_json::to_string(&env).unwrap_or("{}".to_string());
        let ev = SseEvent::default()
            .event(env.kind.clone())
            .id(id.to_string())
            .data(data);
        Result::<SseEvent, std::convert::Infallible>::Ok(ev)
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(10))
            .text("keep-alive"),
    )
}
