//! Byte-string-keyed table primitive: the indexed form of the hash and
//! sorted-set value types, and the backbone of the keyspace map.

use std::collections::HashMap;
use std::collections::hash_map;
use std::hash::BuildHasher;

use xxhash_rust::xxh3::Xxh3;

/// `BuildHasher` running xxh3 over the key bytes. One hash function for
/// every table in the engine keeps lookups cheap and behaviour uniform.
#[derive(Clone, Copy, Default)]
pub struct Xxh3Builder;

impl BuildHasher for Xxh3Builder {
    type Hasher = Xxh3;

    fn build_hasher(&self) -> Xxh3 {
        Xxh3::new()
    }
}

/// A `HashMap` hashed with xxh3.
pub type Xxh3Map<K, V> = HashMap<K, V, Xxh3Builder>;

/// Create an empty xxh3-hashed map.
pub fn new_map<K, V>() -> Xxh3Map<K, V> {
    HashMap::with_hasher(Xxh3Builder)
}

/// Owned-byte-string keyed table with find/insert/delete/iterate/resize.
///
/// Keys are `Box<[u8]>` so lookups can borrow plain `&[u8]` slices
/// without allocating.
pub struct Dict<V> {
    map: Xxh3Map<Box<[u8]>, V>,
}

impl<V> Default for Dict<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Dict<V> {
    pub fn new() -> Self {
        Dict { map: new_map() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    /// Insert, taking ownership of the key. Returns the displaced value
    /// when the key was already present.
    pub fn insert(&mut self, key: Vec<u8>, value: V) -> Option<V> {
        self.map.insert(key.into_boxed_slice(), value)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        self.map.remove(key)
    }

    pub fn entry(&mut self, key: Vec<u8>) -> hash_map::Entry<'_, Box<[u8]>, V> {
        self.map.entry(key.into_boxed_slice())
    }

    /// Pre-size for an expected number of additional entries, so bulk
    /// builds (conversions, union/intersection stores) rehash once.
    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> {
        self.map.iter().map(|(k, v)| (&**k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.map.keys().map(|k| &**k)
    }
}
