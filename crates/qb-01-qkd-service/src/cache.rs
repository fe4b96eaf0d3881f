//! # Residual Pool
//!
//! Bounded cache of verifier residuals keyed by signing event and shape.
//!
//! Every PBFT stage verifies signatures from several peers, and the same
//! signature may be checked again when a message is replayed from the
//! dispatcher buffer. Residual derivation runs the PRF over the whole
//! `k x k` matrix, so the result is kept until capacity forces it out.
//!
//! The lock is never held while a residual is derived. Two threads racing on
//! the same key compute identical matrices and the second insert is a no-op.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::SignIndex;

use crate::domain::ResidualMatrix;

/// Default number of residuals kept by a node.
pub const DEFAULT_POOL_CAPACITY: usize = 4096;

/// Lookup key of one residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResidualKey {
    pub index: SignIndex,
    pub main_row: u32,
    pub verifier_count: u32,
    pub unit_len: u32,
}

#[derive(Default)]
struct PoolInner {
    entries: HashMap<ResidualKey, Arc<ResidualMatrix>>,
    /// Insertion order, oldest first.
    order: VecDeque<ResidualKey>,
}

/// Thread-safe FIFO-evicting residual cache.
pub struct ResidualPool {
    inner: Mutex<PoolInner>,
    capacity: usize,
}

impl ResidualPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &ResidualKey) -> Option<Arc<ResidualMatrix>> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Return the cached residual for `key`, deriving it with `derive` on a miss.
    pub fn get_or_insert_with<F>(&self, key: ResidualKey, derive: F) -> Arc<ResidualMatrix>
    where
        F: FnOnce() -> ResidualMatrix,
    {
        if let Some(hit) = self.get(&key) {
            return hit;
        }

        let fresh = Arc::new(derive());

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.entries.get(&key) {
            return Arc::clone(existing);
        }
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key);
        inner.entries.insert(key, Arc::clone(&fresh));
        fresh
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ResidualPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::DeviceId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(n: u8) -> ResidualKey {
        ResidualKey {
            index: SignIndex::new(DeviceId([n; 16]), [n; 16]),
            main_row: 1,
            verifier_count: 3,
            unit_len: 16,
        }
    }

    fn residual(main_row: u32) -> ResidualMatrix {
        ResidualMatrix {
            main_row,
            verifier_count: 3,
            unit_len: 16,
            cells: Vec::new(),
        }
    }

    #[test]
    fn test_hit_skips_derivation() {
        let pool = ResidualPool::new(8);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            pool.get_or_insert_with(key(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                residual(1)
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let pool = ResidualPool::new(2);
        pool.get_or_insert_with(key(1), || residual(1));
        pool.get_or_insert_with(key(2), || residual(2));
        pool.get_or_insert_with(key(3), || residual(3));

        assert_eq!(pool.len(), 2);
        assert!(pool.get(&key(1)).is_none());
        assert!(pool.get(&key(2)).is_some());
        assert!(pool.get(&key(3)).is_some());
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let pool = ResidualPool::new(0);
        assert_eq!(pool.capacity(), 1);
        pool.get_or_insert_with(key(1), || residual(1));
        pool.get_or_insert_with(key(2), || residual(2));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_agree() {
        let pool = Arc::new(ResidualPool::new(16));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.get_or_insert_with(key(9), || residual(9)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|r| r.main_row == 9));
        assert_eq!(pool.len(), 1);
    }
}
