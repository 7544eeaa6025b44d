use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity FIFO of accepted samples, shared between concurrent cycles.
///
/// `push` is the only mutator and evicts the oldest entries once `capacity`
/// is exceeded. Every method takes the lock for the duration of a single
/// in-memory operation only, so callers never hold it across detection or
/// upload work.
#[derive(Debug)]
pub struct BoundedHistory<T> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
}

impl<T> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a sample, evicting from the front until `len() <= capacity()`.
    /// Returns the evicted samples, oldest first.
    pub fn push(&self, item: T) -> Vec<T> {
        let mut entries = self.lock();
        entries.push_back(item);
        let excess = entries.len().saturating_sub(self.capacity);
        entries.drain(..excess).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the deque half-updated, so
    // poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Most recently pushed sample, if any.
    pub fn latest(&self) -> Option<T> {
        self.lock().back().cloned()
    }

    /// Copy of the current contents in push order.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn keeps_last_capacity_entries() {
        for capacity in 0..6 {
            let history = BoundedHistory::new(capacity);
            let n = capacity + 4;
            for i in 0..n {
                history.push(i);
                assert!(history.len() <= capacity);
            }
            let expected: Vec<usize> = (n - capacity..n).collect();
            assert_eq!(history.snapshot(), expected, "capacity {capacity}");
        }
    }

    #[test]
    fn push_returns_evicted() {
        let history = BoundedHistory::new(2);
        assert!(history.push("a").is_empty());
        assert!(history.push("b").is_empty());
        assert_eq!(history.push("c"), vec!["a"]);
        assert_eq!(history.latest(), Some("c"));
    }

    #[test]
    fn zero_capacity_stays_empty() {
        let history = BoundedHistory::new(0);
        assert_eq!(history.push(1), vec![1]);
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
    }

    #[test]
    fn concurrent_pushes_respect_capacity() {
        let history = Arc::new(BoundedHistory::new(5));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        history.push(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 5);
        // Every thread pushes in increasing order; survivors from the same
        // thread must keep that order.
        for t in 0..8 {
            let mine: Vec<_> = snapshot.iter().filter(|v| **v / 1000 == t).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
