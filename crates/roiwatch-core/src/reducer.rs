use tracing::warn;

use crate::bucket::{self, ClockZone};
use crate::event::{ChangeDescriptor, DetectionEvent, SkippedEvent};
use crate::store::AggregateStore;

/// Applies arrival batches to the session's aggregate store.
///
/// The reducer owns the store, so it is the only writer. Batches are applied
/// one at a time and each produces exactly one [`ChangeDescriptor`].
#[derive(Debug, Default)]
pub struct StreamReducer {
    store: AggregateStore,
    zone: ClockZone,
}

impl StreamReducer {
    pub fn new(zone: ClockZone) -> Self {
        Self {
            store: AggregateStore::new(),
            zone,
        }
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    pub fn zone(&self) -> ClockZone {
        self.zone
    }

    /// Applies `events` in order and reports what changed.
    ///
    /// A violation whose timestamp cannot be classified is skipped as a whole,
    /// so counts and buckets never disagree. Events already applied from the
    /// same batch stay applied.
    pub fn reduce_batch<I>(&mut self, events: I) -> ChangeDescriptor
    where
        I: IntoIterator<Item = DetectionEvent>,
    {
        let mut change = ChangeDescriptor::default();
        for (index, event) in events.into_iter().enumerate() {
            let bucket = if event.is_violation {
                match bucket::classify(&event.timestamp, self.zone) {
                    Ok(b) => Some(b),
                    Err(err) => {
                        warn!(
                            index,
                            class = %event.class,
                            timestamp = %event.timestamp,
                            "skipping violation with unusable timestamp: {err}"
                        );
                        change.skipped.push(SkippedEvent {
                            index,
                            class: event.class,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                }
            } else {
                None
            };

            self.store.record_detection(&event.class, event.confidence);
            if !change.updated_classes.contains(&event.class) {
                change.updated_classes.insert(event.class.clone());
            }
            if let Some(b) = bucket {
                self.store.record_violation(b);
                change.updated_bucket = Some(b);
            }
            change.new_rows.push(event);
        }
        change
    }
}
