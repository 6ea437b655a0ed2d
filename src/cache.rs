//! Minimax score cache
//!
//! Process-wide, shared by every room. Minimax is a pure function of its
//! arguments, so a score computed in one room is valid in all of them.
//! Entries are stamped from a shared clock on every access; once the cache
//! reaches capacity the least recently used tenth is evicted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

/// Default number of cached positions
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Full argument tuple of one minimax call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub signature: u16,
    pub depth: u8,
    /// `None` searches to terminal positions
    pub depth_limit: Option<u8>,
    pub maximizing: bool,
    pub alpha: i32,
    pub beta: i32,
}

#[derive(Debug)]
struct CachedScore {
    score: i32,
    last_used: AtomicU64,
}

/// Bounded concurrent cache of minimax scores
#[derive(Debug)]
pub struct ScoreCache {
    entries: DashMap<CacheKey, CachedScore>,
    capacity: usize,
    clock: AtomicU64,
    evicting: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ScoreCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            evicting: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, key: &CacheKey) -> Option<i32> {
        match self.entries.get(key) {
            Some(entry) => {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.score)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, score: i32) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_least_recent();
        }
        let entry = CachedScore {
            score,
            last_used: AtomicU64::new(self.tick()),
        };
        self.entries.insert(key, entry);
    }

    /// Drop the oldest entries until the cache is a tenth below capacity.
    /// Only one caller evicts at a time; concurrent inserters skip eviction
    /// and may overshoot capacity until the next insert.
    fn evict_least_recent(&self) {
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let mut stamps: Vec<(CacheKey, u64)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().last_used.load(Ordering::Relaxed)))
            .collect();
        stamps.sort_unstable_by_key(|(_, stamp)| *stamp);

        let evict = stamps.len().saturating_sub(self.capacity) + (self.capacity / 10).max(1);
        for (key, _) in stamps.iter().take(evict) {
            self.entries.remove(key);
        }
        debug!("Score cache evicted {} entries", evict.min(stamps.len()));

        self.evicting.store(false, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
