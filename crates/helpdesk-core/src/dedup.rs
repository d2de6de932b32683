use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub const DEFAULT_CAPACITY: usize = 1000;

/// Shared handle used by the webhook and polling paths.
pub type SharedProcessedIds = Arc<Mutex<ProcessedIdSet>>;

/// Remembers recently handled message ids so redelivered notifications are
/// ignored. Once it grows past its capacity, only the newest `capacity / 2`
/// ids are kept.
#[derive(Debug, Clone)]
pub struct ProcessedIdSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl Default for ProcessedIdSet {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ProcessedIdSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    pub fn shared(capacity: usize) -> SharedProcessedIds {
        Arc::new(Mutex::new(Self::with_capacity(capacity)))
    }

    pub fn seen(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn mark_seen(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.members.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            let keep = self.capacity / 2;
            while self.order.len() > keep {
                if let Some(old) = self.order.pop_front() {
                    self.members.remove(&old);
                }
            }
        }
    }

    /// Marks the id and reports whether it was new.
    pub fn check_and_mark(&mut self, id: &str) -> bool {
        if self.seen(id) {
            return false;
        }
        self.mark_seen(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_seen() {
        let mut ids = ProcessedIdSet::default();
        assert!(!ids.seen("a"));
        ids.mark_seen("a");
        ids.mark_seen("a");
        assert!(ids.seen("a"));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_compaction_keeps_most_recent_half() {
        let mut ids = ProcessedIdSet::with_capacity(1000);
        for i in 0..=1000 {
            ids.mark_seen(format!("msg-{i}"));
        }
        assert!(ids.len() <= 500);
        assert!(ids.seen("msg-1000"));
        assert!(ids.seen("msg-501"));
        assert!(!ids.seen("msg-500"));
        assert!(!ids.seen("msg-0"));
    }

    #[test]
    fn test_check_and_mark() {
        let shared = ProcessedIdSet::shared(10);
        let mut guard = shared.lock().unwrap();
        assert!(guard.check_and_mark("x"));
        assert!(!guard.check_and_mark("x"));
    }
}
