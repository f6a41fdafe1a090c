//! Time-expiring query cache.
//!
//! Maps a (query text, parameter set) key to a previously fetched tabular
//! result. Bounded: insertion at capacity first evicts the entry with the
//! oldest insertion timestamp. Eviction is strictly by insertion time, not
//! LRU — a frequently re-read entry is not protected once an older entry
//! exists. Expiry is wall-clock based, with no protection against system
//! clock changes.

use crate::engine::TableResult;
use crate::params::{cache_key, QueryParams};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

struct CacheEntry {
    result: TableResult,
    inserted_at: SystemTime,
    /// Monotone insertion sequence; breaks wall-clock ties during eviction.
    seq: u64,
}

struct CacheState {
    entries: HashMap<crate::params::CacheKey, CacheEntry>,
    next_seq: u64,
}

/// Bounded, time-expiring cache of query results.
///
/// All operations are serialized by one mutex; both eviction paths (expiry
/// in `get`, capacity in `set`) run inline under the same guard. Values
/// cross the boundary as defensive snapshots in both directions.
pub struct QueryCache {
    state: Mutex<CacheState>,
    max_size: usize,
    ttl: Duration,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl: Duration,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl QueryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            max_size,
            ttl,
        }
    }

    /// Look up a cached result.
    ///
    /// Returns a defensive snapshot if present and fresh. An expired entry
    /// is removed as a side effect and reads as absent.
    pub fn get(&self, query: &str, params: Option<&QueryParams>) -> Option<TableResult> {
        let key = cache_key(query, params);
        let mut state = self.state.lock().unwrap();

        let expired = match state.entries.get(&key) {
            None => return None,
            Some(entry) => age_of(entry.inserted_at) >= self.ttl,
        };

        if expired {
            state.entries.remove(&key);
            return None;
        }

        state.entries.get(&key).map(|e| e.result.snapshot())
    }

    /// Store a result under the query+params key.
    ///
    /// At capacity the oldest insertion is evicted first — even when the key
    /// being written already exists, matching the check-then-insert order of
    /// the eviction policy.
    pub fn set(&self, query: &str, params: Option<&QueryParams>, result: &TableResult) {
        if self.max_size == 0 {
            return;
        }

        let key = cache_key(query, params);
        let mut state = self.state.lock().unwrap();

        if state.entries.len() >= self.max_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.inserted_at, e.seq))
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CacheEntry {
                result: result.snapshot(),
                inserted_at: SystemTime::now(),
                seq,
            },
        );
    }

    /// Remove all entries unconditionally.
    pub fn clear(&self) {
        self.state.lock().unwrap().entries.clear();
    }

    /// Report current size, configured bounds, and insertion-time extremes.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        let oldest = state
            .entries
            .values()
            .map(|e| e.inserted_at)
            .min()
            .map(DateTime::<Utc>::from);
        let newest = state
            .entries
            .values()
            .map(|e| e.inserted_at)
            .max()
            .map(DateTime::<Utc>::from);

        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            ttl: self.ttl,
            oldest,
            newest,
        }
    }
}

/// Wall-clock age of an entry. A backwards clock step reads as zero age.
fn age_of(inserted_at: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(inserted_at)
        .unwrap_or_default()
}
