//! Keyspace: the key → typed-value map this engine operates against,
//! with the modification, readiness and event hooks the wider system
//! consumes. Only the contracts the value engine needs exist here; key
//! expiration and the cursor-scan machinery are external.

use std::collections::VecDeque;

use crate::dict::{Xxh3Map, new_map};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::list::List;
use crate::set::Set;
use crate::value::{Value, ValueType};
use crate::zset::SortedSet;

/// Identifies a suspended client in the waiter queues.
pub type ClientId = u64;

/// Keyspace-event classes, mirroring the notification hook's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Generic,
    Hash,
    List,
    SortedSet,
}

/// One fired keyspace event, observable by the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub class: EventClass,
    pub name: &'static str,
    pub key: Vec<u8>,
}

/// A single database: the shared key map plus the per-key waiter queues
/// and the ready-key signal buffer the blocking protocol consumes.
pub struct Db {
    map: Xxh3Map<Vec<u8>, Value>,
    /// key → clients blocked on it, in arrival order.
    blocking_keys: Xxh3Map<Vec<u8>, VecDeque<ClientId>>,
    /// Keys signalled ready since the last sweep, in signal order.
    ready_queue: VecDeque<Vec<u8>>,
    ready_set: Xxh3Map<Vec<u8>, ()>,
    /// Fired keyspace events, in order.
    pub events: Vec<Event>,
    /// Count of keyspace modifications (the signal_modified hook).
    pub dirty: u64,
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

impl Db {
    pub fn new() -> Self {
        Db {
            map: new_map(),
            blocking_keys: new_map(),
            ready_queue: VecDeque::new(),
            ready_set: new_map(),
            events: Vec::new(),
            dirty: 0,
        }
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

    pub fn lookup_read(&self, key: &[u8]) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn lookup_write(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.map.get_mut(key)
    }

    /// Install a value under a key. Creating a list or sorted set is a
    /// becomes-non-empty transition, so matching waiters are signalled.
    pub fn add(&mut self, key: Vec<u8>, value: Value) {
        let signal = matches!(value.type_tag(), ValueType::List | ValueType::SortedSet);
        self.map.insert(key.clone(), value);
        if signal {
            self.signal_ready(&key);
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.map.remove(key)
    }

    /// The modification hook: bump the dirty counter. Touch signalling
    /// for caches lives with the (external) embedder.
    pub fn signal_modified(&mut self, _key: &[u8]) {
        self.dirty += 1;
    }

    pub fn notify_event(&mut self, class: EventClass, name: &'static str, key: &[u8]) {
        self.events.push(Event { class, name, key: key.to_vec() });
    }

    // ---- typed lookups (wrong-type aborts before any mutation) ----

    pub fn hash_read(&self, key: &[u8]) -> Result<Option<&Hash>> {
        match self.lookup_read(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(Error::WrongType),
        }
    }

    pub fn hash_write(&mut self, key: &[u8]) -> Result<Option<&mut Hash>> {
        match self.lookup_write(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(Error::WrongType),
        }
    }

    pub fn list_write(&mut self, key: &[u8]) -> Result<Option<&mut List>> {
        match self.lookup_write(key) {
            None => Ok(None),
            Some(Value::List(l)) => Ok(Some(l)),
            Some(_) => Err(Error::WrongType),
        }
    }

    pub fn zset_read(&self, key: &[u8]) -> Result<Option<&SortedSet>> {
        match self.lookup_read(key) {
            None => Ok(None),
            Some(Value::SortedSet(z)) => Ok(Some(z)),
            Some(_) => Err(Error::WrongType),
        }
    }

    pub fn zset_write(&mut self, key: &[u8]) -> Result<Option<&mut SortedSet>> {
        match self.lookup_write(key) {
            None => Ok(None),
            Some(Value::SortedSet(z)) => Ok(Some(z)),
            Some(_) => Err(Error::WrongType),
        }
    }

    pub fn set_read(&self, key: &[u8]) -> Result<Option<&Set>> {
        match self.lookup_read(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(Error::WrongType),
        }
    }

    // ---- blocking support ----

    pub(crate) fn has_waiters(&self, key: &[u8]) -> bool {
        self.blocking_keys.get(key).is_some_and(|q| !q.is_empty())
    }

    /// Register a client at the back of a key's waiter queue.
    pub(crate) fn enqueue_waiter(&mut self, key: &[u8], client: ClientId) {
        let queue = self
            .blocking_keys
            .entry(key.to_vec())
            .or_insert_with(VecDeque::new);
        if !queue.contains(&client) {
            queue.push_back(client);
        }
    }

    /// Remove a client from one key's waiter queue.
    pub(crate) fn dequeue_waiter(&mut self, key: &[u8], client: ClientId) {
        if let Some(queue) = self.blocking_keys.get_mut(key) {
            queue.retain(|c| *c != client);
            if queue.is_empty() {
                self.blocking_keys.remove(key);
            }
        }
    }

    /// Waiters on a key, in arrival order.
    pub(crate) fn waiters_on(&self, key: &[u8]) -> Vec<ClientId> {
        self.blocking_keys
            .get(key)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Flag a key as ready; consumed by the blocking engine after the
    /// current command. No-op unless someone is actually waiting.
    pub(crate) fn signal_ready(&mut self, key: &[u8]) {
        if !self.has_waiters(key) || self.ready_set.contains_key(key) {
            return;
        }
        self.ready_set.insert(key.to_vec(), ());
        self.ready_queue.push_back(key.to_vec());
    }

    /// Drain the ready-key buffer, in signal order.
    pub(crate) fn take_ready(&mut self) -> Vec<Vec<u8>> {
        self.ready_set.clear();
        self.ready_queue.drain(..).collect()
    }
}
