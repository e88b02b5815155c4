//! Bounded seek history

use std::collections::VecDeque;

use super::{SeekEvent, StoredSeek};

/// Maximum number of scrubs remembered per session
pub const HISTORY_CAPACITY: usize = 3;

/// Ordered log of accepted scrubs, oldest first
///
/// Never holds more than `HISTORY_CAPACITY` events; pushing onto a full
/// history evicts the oldest one.
#[derive(Debug, Clone, Default)]
pub struct SeekHistory {
    entries: VecDeque<SeekEvent>,
}

impl SeekHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append an event, returning the evicted one if the history was full
    pub fn push(&mut self, event: SeekEvent) -> Option<SeekEvent> {
        self.entries.push_back(event);
        if self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove and return the most recent event
    pub fn pop_latest(&mut self) -> Option<SeekEvent> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &SeekEvent> {
        self.entries.iter()
    }

    /// Snapshot in persisted form
    pub fn to_stored(&self) -> Vec<StoredSeek> {
        self.entries.iter().map(StoredSeek::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(origin: f64, target: f64) -> SeekEvent {
        SeekEvent::new(origin, target)
    }

    #[test]
    fn test_fourth_push_evicts_first() {
        let mut history = SeekHistory::new();
        assert!(history.push(event(1.0, 10.0)).is_none());
        assert!(history.push(event(2.0, 20.0)).is_none());
        assert!(history.push(event(3.0, 30.0)).is_none());

        let evicted = history.push(event(4.0, 40.0)).unwrap();
        assert_eq!(evicted.origin, 1.0);
        assert_eq!(history.len(), HISTORY_CAPACITY);

        let origins: Vec<f64> = history.iter().map(|e| e.origin).collect();
        assert_eq!(origins, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut history = SeekHistory::new();
        for i in 0..50 {
            history.push(event(i as f64, i as f64 + 1.0));
            assert!(history.len() <= HISTORY_CAPACITY);
        }
        let origins: Vec<f64> = history.iter().map(|e| e.origin).collect();
        assert_eq!(origins, vec![47.0, 48.0, 49.0]);
    }

    #[test]
    fn test_pop_latest_walks_backwards() {
        let mut history = SeekHistory::new();
        history.push(event(1.0, 10.0));
        history.push(event(2.0, 20.0));

        assert_eq!(history.pop_latest().unwrap().origin, 2.0);
        assert_eq!(history.pop_latest().unwrap().origin, 1.0);
        assert!(history.pop_latest().is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn test_stored_snapshot_is_oldest_first() {
        let mut history = SeekHistory::new();
        for i in 0..5 {
            history.push(event(i as f64, i as f64 * 10.0));
        }

        let stored: Vec<(f64, f64)> = history
            .to_stored()
            .iter()
            .map(|record| (record.origin, record.target))
            .collect();
        assert_eq!(stored, vec![(2.0, 20.0), (3.0, 30.0), (4.0, 40.0)]);
    }
}
