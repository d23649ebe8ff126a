use std::collections::VecDeque;

use crate::event::DetectionEvent;

/// Fixed-capacity log of the most recent detection rows.
#[derive(Debug, Clone)]
pub struct RecentLog {
    rows: VecDeque<DetectionEvent>,
    capacity: usize,
}

impl RecentLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: DetectionEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.rows.len() >= self.capacity {
            self.rows.pop_front();
        }
        self.rows.push_back(row);
    }

    pub fn extend<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = DetectionEvent>,
    {
        for row in rows {
            self.push(row);
        }
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &DetectionEvent> {
        self.rows.iter().rev()
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &DetectionEvent> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(class: &str) -> DetectionEvent {
        DetectionEvent::new("2024-05-01 10:00:00", class, 50.0, false)
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut log = RecentLog::new(2);
        log.extend(["a", "b", "c"].map(row));
        assert_eq!(log.len(), 2);
        let newest: Vec<_> = log.newest_first().map(|r| r.class.as_str()).collect();
        assert_eq!(newest, ["c", "b"]);
        let oldest: Vec<_> = log.oldest_first().map(|r| r.class.as_str()).collect();
        assert_eq!(oldest, ["b", "c"]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = RecentLog::new(0);
        log.push(row("a"));
        assert!(log.is_empty());
    }
}
