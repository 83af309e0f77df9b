//! Bounded least-recently-used embedding cache.
//!
//! Entries live in a slab (`Vec<Entry>`) threaded into a doubly linked
//! recency list by index; a `HashMap` maps the exact input text to its slot.
//! Lookups, inserts and evictions are all O(1).

use serde::Serialize;
use std::collections::HashMap;
use urbanroute_core::Embedding;

const NIL: usize = usize::MAX;

struct Entry {
    text: String,
    embedding: Embedding,
    prev: usize,
    next: usize,
}

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Text → embedding cache with LRU eviction.
///
/// Keys are compared by exact string equality: no trimming, no case folding.
pub struct EmbeddingCache {
    index: HashMap<String, usize>,
    entries: Vec<Entry>,
    /// Most recently used
    head: usize,
    /// Least recently used
    tail: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` entries. A capacity of 0 is
    /// treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up `text`, marking it most recently used on a hit.
    pub fn get(&mut self, text: &str) -> Option<Embedding> {
        match self.index.get(text).copied() {
            Some(slot) => {
                self.hits += 1;
                self.touch(slot);
                Some(self.entries[slot].embedding.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Whether `text` is cached. Does not affect recency or counters.
    pub fn contains(&self, text: &str) -> bool {
        self.index.contains_key(text)
    }

    /// Insert or refresh an entry, evicting the least recently used one when
    /// full. Returns the evicted text, if any.
    pub fn insert(&mut self, text: String, embedding: Embedding) -> Option<String> {
        if let Some(&slot) = self.index.get(&text) {
            self.entries[slot].embedding = embedding;
            self.touch(slot);
            return None;
        }

        if self.entries.len() < self.capacity {
            let slot = self.entries.len();
            self.entries.push(Entry {
                text: text.clone(),
                embedding,
                prev: NIL,
                next: NIL,
            });
            self.index.insert(text, slot);
            self.push_front(slot);
            return None;
        }

        // Full: reuse the LRU slot.
        let slot = self.tail;
        self.unlink(slot);
        let old = std::mem::replace(&mut self.entries[slot].text, text.clone());
        self.index.remove(&old);
        self.entries[slot].embedding = embedding;
        self.index.insert(text, slot);
        self.push_front(slot);
        self.evictions += 1;
        Some(old)
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

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            len: self.len(),
            capacity: self.capacity,
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Cached texts from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.entries.len());
        let mut cursor = self.head;
        while cursor != NIL {
            keys.push(self.entries[cursor].text.as_str());
            cursor = self.entries[cursor].next;
        }
        keys
    }

    fn touch(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.entries[slot].prev, self.entries[slot].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.entries[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.entries[next].prev = prev;
        }
        self.entries[slot].prev = NIL;
        self.entries[slot].next = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        self.entries[slot].prev = NIL;
        self.entries[slot].next = self.head;
        if self.head != NIL {
            self.entries[self.head].prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }
}
