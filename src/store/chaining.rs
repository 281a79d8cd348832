use std::fmt;
use std::mem;

use tracing::trace;

use crate::config::constant::{INITIAL_BUCKETS, MAX_LOAD_FACTOR};
use crate::error::{DispatchError, Result};

/// Integer ids usable as store keys. The hash is the id itself, so small
/// contiguous ids spread evenly across buckets and iterate in id order.
pub trait StoreKey: Copy + Eq + fmt::Display + fmt::Debug {
    fn hash_key(&self) -> u64;
}

impl StoreKey for u32 {
    fn hash_key(&self) -> u64 {
        u64::from(*self)
    }
}

impl StoreKey for u64 {
    fn hash_key(&self) -> u64 {
        *self
    }
}

impl StoreKey for usize {
    fn hash_key(&self) -> u64 {
        *self as u64
    }
}

/// Chaining hash table: a growable array of buckets, each an ordered list of
/// `(key, value)` entries.
///
/// The bucket count doubles whenever an insertion would leave the load factor
/// above 0.5. Removal never shrinks the table.
#[derive(Debug, Clone)]
pub struct KeyedStore<K, V> {
    buckets: Vec<Vec<(K, V)>>,
    len: usize,
}

impl<K: StoreKey, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StoreKey, V> KeyedStore<K, V> {
    pub fn new() -> Self {
        Self::with_buckets(INITIAL_BUCKETS)
    }

    pub fn with_buckets(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: (0..bucket_count).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    fn bucket_index(key: &K, bucket_count: usize) -> usize {
        (key.hash_key() % bucket_count as u64) as usize
    }

    /// Inserts `value` under `key`. Returns the previous value when the key was
    /// already present; the entry count is unchanged in that case.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let idx = Self::bucket_index(&key, self.buckets.len());
        let bucket = &mut self.buckets[idx];

        if let Some(slot) = bucket.iter_mut().find(|(k, _)| *k == key) {
            return Some(mem::replace(&mut slot.1, value));
        }

        bucket.push((key, value));
        self.len += 1;

        while self.load_factor() > MAX_LOAD_FACTOR {
            self.grow_and_rehash();
        }
        None
    }

    /// Doubles the bucket count and moves every entry to the bucket its key
    /// hashes to under the new count. Chain order is preserved per bucket.
    pub fn grow_and_rehash(&mut self) {
        let new_count = self.buckets.len() * 2;
        let old = mem::replace(
            &mut self.buckets,
            (0..new_count).map(|_| Vec::new()).collect(),
        );

        for (key, value) in old.into_iter().flatten() {
            let idx = Self::bucket_index(&key, new_count);
            self.buckets[idx].push((key, value));
        }
        trace!("Rehashed {} entries into {} buckets", self.len, new_count);
    }

    fn locate(&self, key: &K) -> Option<(usize, usize)> {
        let idx = Self::bucket_index(key, self.buckets.len());
        self.buckets[idx]
            .iter()
            .position(|(k, _)| k == key)
            .map(|pos| (idx, pos))
    }

    /// Lookup that treats absence as an ordinary outcome.
    pub fn find(&self, key: K) -> Option<&V> {
        self.locate(&key).map(|(b, p)| &self.buckets[b][p].1)
    }

    pub fn get(&self, key: K) -> Result<&V> {
        self.find(key).ok_or_else(|| DispatchError::not_found(key))
    }

    pub fn get_mut(&mut self, key: K) -> Result<&mut V> {
        match self.locate(&key) {
            Some((b, p)) => Ok(&mut self.buckets[b][p].1),
            None => Err(DispatchError::not_found(key)),
        }
    }

    pub fn remove(&mut self, key: K) -> Result<V> {
        match self.locate(&key) {
            Some((b, p)) => {
                self.len -= 1;
                Ok(self.buckets[b].remove(p).1)
            }
            None => Err(DispatchError::not_found(key)),
        }
    }

    /// Applies `mutator` to the stored value in place and returns its result.
    pub fn update<R>(&mut self, key: K, mutator: impl FnOnce(&mut V) -> R) -> Result<R> {
        self.get_mut(key).map(mutator)
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.locate(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    /// Entries in bucket order, then chain order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.buckets.iter().flatten().map(|(k, v)| (*k, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.buckets.iter().flatten().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.buckets.iter_mut().flatten().map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k).collect()
    }
}
