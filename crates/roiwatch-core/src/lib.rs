//! Streaming aggregation over object-detection events.
//!
//! Batches arrive from a push channel, are folded into an [`AggregateStore`]
//! by a [`StreamReducer`], and each batch yields a [`ChangeDescriptor`] that a
//! [`ViewProjector`] uses to refresh a table view, a per-class confidence bar
//! chart and a violations-by-time-of-day pie chart.

pub mod bucket;
mod error;
pub mod event;
pub mod log;
pub mod reducer;
pub mod store;
pub mod view;
pub mod wire;

pub use bucket::{classify, ClockZone, TimeBucket};
pub use error::{Error, Result};
pub use event::{ChangeDescriptor, DetectionEvent, SkippedEvent};
pub use log::RecentLog;
pub use reducer::StreamReducer;
pub use store::{AggregateStore, BucketCounts, ClassAverage, ClassStat, StoreSnapshot};
pub use view::{pie_slices, PieSlice, ViewProjector};
pub use wire::{BatchFrame, FeedSummary, ViolationFlag};
