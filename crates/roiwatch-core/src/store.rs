use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bucket::TimeBucket;

/// Running statistics for one detection class.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClassStat {
    pub count: u64,
    pub confidence_sum: f64,
    /// Order in which the class was first observed (0 for the first class).
    pub first_seen: u64,
}

impl ClassStat {
    pub fn average_confidence(&self) -> Option<f64> {
        (self.count > 0).then(|| self.confidence_sum / self.count as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassAverage {
    pub class: String,
    pub average: f64,
    pub count: u64,
}

/// Violation counts per time-of-day bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub morning: u64,
    pub afternoon: u64,
    pub night: u64,
}

impl BucketCounts {
    pub fn get(&self, bucket: TimeBucket) -> u64 {
        self.as_array()[bucket.index()]
    }

    /// Counts in morning, afternoon, night order.
    pub fn as_array(&self) -> [u64; 3] {
        [self.morning, self.afternoon, self.night]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeBucket, u64)> + '_ {
        TimeBucket::ALL.into_iter().map(|b| (b, self.get(b)))
    }

    pub fn total(&self) -> u64 {
        self.morning + self.afternoon + self.night
    }
}

/// Full read model, as served to JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSnapshot {
    pub classes: Vec<ClassAverage>,
    pub buckets: BucketCounts,
    pub total_detections: u64,
    pub total_violations: u64,
    pub most_frequent_class: Option<String>,
}

/// Per-class and per-bucket aggregates for one dashboard session.
///
/// Memory is bounded by the number of distinct classes: confidences are
/// folded into a running sum, never kept as samples.
#[derive(Debug, Clone, Default)]
pub struct AggregateStore {
    classes: HashMap<String, ClassStat>,
    buckets: [u64; 3],
    next_ordinal: u64,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_detection(&mut self, class: &str, confidence: f64) {
        if let Some(stat) = self.classes.get_mut(class) {
            stat.count += 1;
            stat.confidence_sum += confidence;
            return;
        }
        let first_seen = self.next_ordinal;
        self.next_ordinal += 1;
        self.classes.insert(
            class.to_string(),
            ClassStat {
                count: 1,
                confidence_sum: confidence,
                first_seen,
            },
        );
    }

    pub fn record_violation(&mut self, bucket: TimeBucket) {
        self.buckets[bucket.index()] += 1;
    }

    pub fn class_stat(&self, class: &str) -> Option<&ClassStat> {
        self.classes.get(class)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Average confidence of every observed class, in first-seen order.
    pub fn snapshot_class_averages(&self) -> Vec<ClassAverage> {
        let mut rows: Vec<(&String, &ClassStat)> = self.classes.iter().collect();
        rows.sort_by_key(|(_, stat)| stat.first_seen);
        rows.into_iter()
            .filter_map(|(class, stat)| {
                stat.average_confidence().map(|average| ClassAverage {
                    class: class.clone(),
                    average,
                    count: stat.count,
                })
            })
            .collect()
    }

    pub fn snapshot_bucket_counts(&self) -> BucketCounts {
        let [morning, afternoon, night] = self.buckets;
        BucketCounts {
            morning,
            afternoon,
            night,
        }
    }

    pub fn total_detections(&self) -> u64 {
        self.classes.values().map(|s| s.count).sum()
    }

    pub fn total_violations(&self) -> u64 {
        self.buckets.iter().sum()
    }

    /// Class with the highest count; ties go to the class observed first.
    pub fn most_frequent_class(&self) -> Option<&str> {
        self.classes
            .iter()
            .max_by(|a, b| {
                a.1.count
                    .cmp(&b.1.count)
                    .then_with(|| b.1.first_seen.cmp(&a.1.first_seen))
            })
            .map(|(class, _)| class.as_str())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            classes: self.snapshot_class_averages(),
            buckets: self.snapshot_bucket_counts(),
            total_detections: self.total_detections(),
            total_violations: self.total_violations(),
            most_frequent_class: self.most_frequent_class().map(str::to_string),
        }
    }
}
