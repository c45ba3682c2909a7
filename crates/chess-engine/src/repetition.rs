//! Bounded history of position hashes for repetition detection.

use std::collections::VecDeque;

/// Ring of the most recent position hashes, newest last.
///
/// Pushed on every move and popped on every rollback. When full, the oldest
/// entry is dropped; positions that far back can no longer repeat under the
/// fifty-move rule anyway.
#[derive(Debug, Clone)]
pub struct RepetitionTable {
    hashes: VecDeque<u64>,
    capacity: usize,
}

impl RepetitionTable {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        RepetitionTable {
            hashes: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, hash: u64) {
        if self.hashes.len() == self.capacity {
            self.hashes.pop_front();
        }
        self.hashes.push_back(hash);
    }

    pub fn pop(&mut self) -> Option<u64> {
        self.hashes.pop_back()
    }

    /// Occurrences of `hash` among the newest `window` entries.
    pub fn count_recent(&self, hash: u64, window: usize) -> usize {
        self.hashes
            .iter()
            .rev()
            .take(window)
            .filter(|&&h| h == hash)
            .count()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Default for RepetitionTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut t = RepetitionTable::new(4);
        t.push(1);
        t.push(2);
        assert_eq!(t.pop(), Some(2));
        assert_eq!(t.pop(), Some(1));
        assert_eq!(t.pop(), None);
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let mut t = RepetitionTable::new(3);
        for h in [7, 8, 9, 10] {
            t.push(h);
        }
        assert_eq!(t.len(), 3);
        assert_eq!(t.count_recent(7, 10), 0);
        assert_eq!(t.count_recent(8, 10), 1);
    }

    #[test]
    fn window_limits_count() {
        let mut t = RepetitionTable::default();
        for h in [5, 1, 5, 2, 5] {
            t.push(h);
        }
        assert_eq!(t.count_recent(5, 5), 3);
        assert_eq!(t.count_recent(5, 2), 1);
    }
}
