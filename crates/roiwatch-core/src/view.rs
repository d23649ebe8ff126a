//! Narrow interface between the aggregation core and whatever draws it.

use crate::bucket::TimeBucket;
use crate::event::ChangeDescriptor;
use crate::store::{AggregateStore, BucketCounts};
use crate::wire::FeedSummary;

/// Receives one call per reduced batch.
///
/// Implementations re-read snapshots from `store` as needed; `change` only
/// says what moved.
pub trait ViewProjector {
    type Error;

    fn project(
        &mut self,
        change: &ChangeDescriptor,
        store: &AggregateStore,
        summary: Option<&FeedSummary>,
    ) -> Result<(), Self::Error>;
}

/// One slice of the violations-by-time-of-day pie.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieSlice {
    pub bucket: TimeBucket,
    pub legend: &'static str,
    pub count: u64,
    /// Fraction of all violations in [0, 1]; 0 when there are none.
    pub share: f64,
}

pub fn pie_slices(counts: &BucketCounts) -> [PieSlice; 3] {
    let total = counts.total();
    TimeBucket::ALL.map(|bucket| {
        let count = counts.get(bucket);
        PieSlice {
            bucket,
            legend: bucket.legend(),
            count,
            share: if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_keep_bucket_order_and_shares() {
        let counts = BucketCounts {
            morning: 1,
            afternoon: 0,
            night: 3,
        };
        let slices = pie_slices(&counts);
        assert_eq!(slices[0].legend, "Morning (6 AM - 12 PM)");
        assert_eq!(slices[1].count, 0);
        assert_eq!(slices[2].share, 0.75);
    }

    #[test]
    fn empty_pie_has_zero_shares() {
        let slices = pie_slices(&BucketCounts::default());
        assert!(slices.iter().all(|s| s.share == 0.0));
    }
}
