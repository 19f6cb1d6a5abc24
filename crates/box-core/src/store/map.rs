//! # Shared Map
//!
//! String-keyed hash table with separate chaining (djb2, 256 buckets by
//! default). One mutex guards every operation; readers and writers are
//! mutually exclusive and no iteration snapshot is offered.
//!
//! Keys are copied on insert. A value replaced by `set` or removed by
//! `clear` is dropped; `remove` hands the value back instead.

use parking_lot::Mutex;

use box_protocol::MAP_BUCKETS;

/// djb2 string hash
#[inline]
pub fn djb2(key: &str) -> u32 {
    key.bytes()
        .fold(5381u32, |hash, b| hash.wrapping_mul(33).wrapping_add(b as u32))
}

struct Table<V> {
    buckets: Vec<Vec<(String, V)>>,
    len: usize,
}

impl<V> Table<V> {
    #[inline]
    fn bucket(&self, key: &str) -> usize {
        djb2(key) as usize % self.buckets.len()
    }
}

pub struct SharedMap<V> {
    table: Mutex<Table<V>>,
}

impl<V> Default for SharedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SharedMap<V> {
    pub fn new() -> Self {
        Self::with_buckets(MAP_BUCKETS)
    }

    /// `buckets` is clamped to at least one
    pub fn with_buckets(buckets: usize) -> Self {
        let buckets = buckets.max(1);
        SharedMap {
            table: Mutex::new(Table {
                buckets: (0..buckets).map(|_| Vec::new()).collect(),
                len: 0,
            }),
        }
    }

    /// Insert or replace; returns true if a previous value was dropped
    pub fn set(&self, key: &str, value: V) -> bool {
        let mut table = self.table.lock();
        let idx = table.bucket(key);
        let chain = &mut table.buckets[idx];
        if let Some(entry) = chain.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
            return true;
        }
        chain.push((key.to_string(), value));
        table.len += 1;
        false
    }

    /// Run `f` on the value under the lock
    pub fn get<R>(&self, key: &str, f: impl FnOnce(&V) -> R) -> Option<R> {
        let table = self.table.lock();
        let idx = table.bucket(key);
        table.buckets[idx]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| f(v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key, |_| ()).is_some()
    }

    /// Detach and return the value without dropping it
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut table = self.table.lock();
        let idx = table.bucket(key);
        let chain = &mut table.buckets[idx];
        let pos = chain.iter().position(|(k, _)| k == key)?;
        let (_, value) = chain.swap_remove(pos);
        table.len -= 1;
        Some(value)
    }

    /// Drop every value
    pub fn clear(&self) {
        let mut table = self.table.lock();
        for chain in table.buckets.iter_mut() {
            chain.clear();
        }
        table.len = 0;
    }

    pub fn len(&self) -> usize {
        self.table.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> SharedMap<V> {
    pub fn get_cloned(&self, key: &str) -> Option<V> {
        self.get(key, V::clone)
    }
}
