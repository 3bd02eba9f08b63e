//! A bounded least-recently-used map.

use std::collections::HashMap;
use std::hash::Hash;
use std::ptr::NonNull;

/// Hit and eviction counters of one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found their key.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Entries pushed out by capacity pressure.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, zero when no lookups happened.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<NonNull<Node<K, V>>>,
    next: Option<NonNull<Node<K, V>>>,
}

/// A fixed-capacity map evicting its least recently used entry on overflow.
///
/// Lookups and inserts refresh recency. `insert` hands the evicted pair
/// back to the caller, which is what lets a tiered log demote entries into
/// its next tier instead of losing them.
///
/// Entries hang off a hash map into an intrusive doubly linked list; every
/// operation is O(1).
pub struct LruCache<K, V> {
    map: HashMap<K, NonNull<Node<K, V>>>,
    head: Option<NonNull<Node<K, V>>>,
    tail: Option<NonNull<Node<K, V>>>,
    capacity: usize,
    stats: CacheStats,
}

// SAFETY: every node is exclusively owned by the cache, and the raw
// pointers never escape the struct.
unsafe impl<K: Send, V: Send> Send for LruCache<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for LruCache<K, V> {}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries. A zero capacity
    /// is raised to one so the entry being worked on always fits.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            head: None,
            tail: None,
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `key` is cached. Does not refresh recency.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Cached keys, unordered.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.map.keys().cloned().collect()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Looks up `key`, marking the entry most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.map.get(key).copied() {
            Some(node) => {
                self.stats.hits += 1;
                self.move_to_front(node);
                // SAFETY: the node is owned by the map and lives until it
                // is removed, which requires `&mut self`.
                Some(unsafe { &(*node.as_ptr()).value })
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts or refreshes `key`, returning the entry evicted by capacity
    /// pressure, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(node) = self.map.get(&key).copied() {
            // SAFETY: node owned by the map; replacing the value in place.
            unsafe {
                (*node.as_ptr()).value = value;
            }
            self.move_to_front(node);
            return None;
        }

        let node = NonNull::from(Box::leak(Box::new(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        })));
        self.attach_front(node);
        self.map.insert(key, node);

        if self.map.len() > self.capacity {
            self.stats.evictions += 1;
            return self.pop_tail();
        }
        None
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let node = self.map.remove(key)?;
        self.detach(node);
        // SAFETY: the node left both the map and the list; reclaim the box.
        let boxed = unsafe { Box::from_raw(node.as_ptr()) };
        Some(boxed.value)
    }

    /// Drops every entry, keeping the capacity and counters.
    pub fn clear(&mut self) {
        for (_, node) in self.map.drain() {
            // SAFETY: draining the map drops the last handle to each node.
            unsafe { drop(Box::from_raw(node.as_ptr())) };
        }
        self.head = None;
        self.tail = None;
    }

    fn pop_tail(&mut self) -> Option<(K, V)> {
        let node = self.tail?;
        self.detach(node);
        // SAFETY: detached above; reclaim the box.
        let boxed = unsafe { Box::from_raw(node.as_ptr()) };
        self.map.remove(&boxed.key);
        Some((boxed.key, boxed.value))
    }

    fn move_to_front(&mut self, node: NonNull<Node<K, V>>) {
        if self.head == Some(node) {
            return;
        }
        self.detach(node);
        self.attach_front(node);
    }

    fn attach_front(&mut self, mut node: NonNull<Node<K, V>>) {
        // SAFETY: nodes in the list are exclusively owned by this cache.
        unsafe {
            node.as_mut().prev = None;
            node.as_mut().next = self.head;
            if let Some(mut head) = self.head {
                head.as_mut().prev = Some(node);
            }
        }
        self.head = Some(node);
        if self.tail.is_none() {
            self.tail = Some(node);
        }
    }

    fn detach(&mut self, node: NonNull<Node<K, V>>) {
        // SAFETY: nodes in the list are exclusively owned by this cache.
        unsafe {
            let prev = node.as_ref().prev;
            let next = node.as_ref().next;
            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }
            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }
}

impl<K, V> Drop for LruCache<K, V> {
    fn drop(&mut self) {
        for (_, node) in self.map.drain() {
            // SAFETY: dropping the cache drops the last handle to each node.
            unsafe { drop(Box::from_raw(node.as_ptr())) };
        }
    }
}
