//! Process-local response cache with a fixed capacity and time-to-live.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::QueryResponse;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

const STREAMING_PREFIX: &str = "streaming_";

/// Cache key of a non-streaming answer.
pub fn query_key(query: &str, document_set: &str) -> String {
    format!("{}{document_set}", query.to_lowercase())
}

/// Cache key of a streamed answer.
pub fn streaming_key(query: &str, document_set: &str) -> String {
    format!("{STREAMING_PREFIX}{}", query_key(query, document_set))
}

/// A cached endpoint result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResponse {
    Answer(QueryResponse),
    /// Complete text of a finished stream.
    StreamText(String),
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Insertion sequence number to key, oldest first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

/// Bounded map whose entries expire a fixed time after insertion.
///
/// When full, the entry inserted longest ago is evicted. Expired entries
/// read as misses and are dropped lazily.
pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(Inner { entries: HashMap::new(), order: BTreeMap::new(), next_seq: 0 }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();
        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(entry) => entry.seq,
        };
        inner.order.remove(&expired);
        inner.entries.remove(key);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.lock();
        let now = Instant::now();

        if let Some(old) = inner.entries.remove(&key) {
            inner.order.remove(&old.seq);
        }
        if inner.entries.len() >= self.capacity {
            inner.purge_expired(now);
        }
        while inner.entries.len() >= self.capacity {
            let Some((_, oldest)) = inner.order.pop_first() else { break };
            inner.entries.remove(&oldest);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(key, Entry { value, expires_at: now + self.ttl, seq });
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        // Entries stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash,
{
    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .order
            .iter()
            .filter(|(_, key)| self.entries.get(*key).is_some_and(|e| e.expires_at <= now))
            .map(|(seq, _)| *seq)
            .collect();
        for seq in expired {
            if let Some(key) = self.order.remove(&seq) {
                self.entries.remove(&key);
            }
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

/// The cache shared by the answering endpoints.
pub type ResponseCache = TtlCache<String, CachedResponse>;
