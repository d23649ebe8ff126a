use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Event envelope (RFC3339 time, millisecond precision, UTC).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Envelope {
    pub time: String,
    pub kind: String,
    pub payload: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(kind: &str, payload: &T) -> Self {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let payload = serde_json::to_value(payload).unwrap_or_else(|err| {
            tracing::warn!(kind, "event payload failed to serialize: {err}");
            serde_json::json!({"_ser": "error"})
        });
        Self {
            time: now,
            kind: kind.to_string(),
            payload,
        }
    }
}

/// Broadcast bus fanning envelopes out to every live subscriber.
///
/// Publishing never blocks or fails: with no subscribers the envelope is
/// dropped, and slow subscribers observe `RecvError::Lagged`.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Envelope>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish<T: Serialize>(&self, kind: &str, payload: &T) {
        let _ = self.tx.send(Envelope::new(kind, payload));
    }
}
