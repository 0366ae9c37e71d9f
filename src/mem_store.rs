//! In-memory node store.
//!
//! [`MemStore`] keeps serialized nodes keyed by their path from the root. It
//! is the flush target of [`Trie::flush`](crate::Trie::flush) and a
//! [`NodeResolver`] for tries that load their nodes lazily, which makes it
//! the natural stand-in for a database in tests and benchmarks.
//!
//! All operations are thread-safe through a [`RwLock`].
use crate::traits::{NodeResolver, ResolverError};
use std::{collections::BTreeMap, sync::RwLock};

/// Serialized nodes keyed by path.
#[derive(Debug, Default)]
pub struct MemStore {
    nodes: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Clone for MemStore {
    fn clone(&self) -> Self {
        Self {
            nodes: RwLock::new(self.nodes.read().expect("node lock poisoned").clone()),
        }
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the encoded node at `path`, replacing any previous one.
    pub fn put(&self, path: &[u8], node: Vec<u8>) {
        self.nodes
            .write()
            .expect("node lock poisoned")
            .insert(path.to_vec(), node);
    }

    pub fn get(&self, path: &[u8]) -> Option<Vec<u8>> {
        self.nodes
            .read()
            .expect("node lock poisoned")
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().expect("node lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeResolver for MemStore {
    fn resolve(&self, path: &[u8]) -> Result<Vec<u8>, ResolverError> {
        self.get(path)
            .ok_or_else(|| format!("node at path 0x{} not found", hex::encode(path)).into())
    }
}
