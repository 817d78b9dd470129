//! ObjectStore implementation
//!
//! BTreeMap-based object map with a parking_lot RwLock for concurrency.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::protocol::{GetResult, PutStatus, RemoveStatus, Request, Response};

/// In-memory map from key to object
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl ObjectStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` under `key` unless the key is already present
    ///
    /// The existence check and the insert happen under one write lock, so of
    /// two racing puts on the same key exactly one succeeds.
    pub fn put(&self, key: impl Into<String>, data: impl Into<Bytes>) -> PutStatus {
        match self.objects.write().entry(key.into()) {
            Entry::Occupied(_) => PutStatus::KeyAlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(data.into());
                PutStatus::Success
            }
        }
    }

    /// Look up the object stored under `key` (read lock)
    pub fn get(&self, key: &str) -> GetResult {
        self.objects.read().get(key).cloned().into()
    }

    /// Delete `key` if present (write lock)
    pub fn remove(&self, key: &str) -> RemoveStatus {
        match self.objects.write().remove(key) {
            Some(_) => RemoveStatus::Success,
            None => RemoveStatus::KeyNotExists,
        }
    }

    /// Snapshot of every key, in ascending order
    pub fn list(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Execute a request against the store
    ///
    /// Returns `None` for DISCONNECT, which touches no state and gets no
    /// response.
    pub fn execute(&self, request: Request) -> Option<Response> {
        let response = match request {
            Request::Put { key, data } => Response::Put(self.put(key, data)),
            Request::Get { key } => Response::Get(self.get(&key)),
            Request::Remove { key } => Response::Remove(self.remove(&key)),
            Request::List => Response::List(self.list()),
            Request::Disconnect => return None,
        };
        Some(response)
    }
}
