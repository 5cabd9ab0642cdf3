//! Bounded memoization of allocation solves.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Exact solver input, compared bit for bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    returns: Vec<u64>,
    risks: Vec<u64>,
    cap: u64,
}

impl CacheKey {
    pub fn new(expected_returns: &[f64], risks: &[f64], cap: f64) -> Self {
        Self {
            returns: expected_returns.iter().map(|v| v.to_bits()).collect(),
            risks: risks.iter().map(|v| v.to_bits()).collect(),
            cap: cap.to_bits(),
        }
    }
}

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Least-recently-used cache of allocation vectors.
///
/// Recency is tracked in a deque (front = least recent). Lookups touch the
/// entry; inserts beyond capacity evict the front.
#[derive(Debug)]
pub struct AllocationCache {
    capacity: usize,
    entries: HashMap<CacheKey, Vec<f64>>,
    recency: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

impl AllocationCache {
    /// Create a cache holding at most `capacity` entries (0 disables caching).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Vec<f64>> {
        match self.entries.get(key) {
            Some(weights) => {
                let weights = weights.clone();
                self.touch(key);
                self.hits += 1;
                Some(weights)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, weights: Vec<f64>) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.contains_key(&key) {
            self.touch(&key);
            self.entries.insert(key, weights);
            return;
        }

        while self.entries.len() >= self.capacity {
            match self.recency.pop_front() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                    debug!(len = self.entries.len(), "Evicted least recently used allocation");
                }
                None => break,
            }
        }

        self.recency.push_back(key.clone());
        self.entries.insert(key, weights);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.entries.len(),
            capacity: self.capacity,
        }
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }
}
