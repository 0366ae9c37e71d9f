//! This module implements [`Trie`].

use crate::{
    constant::MIN_PAR_BATCH_SIZE,
    epoch::StateEpoch,
    node::{resolve_node, InternalNode, Node},
    proof::ProofItems,
    traits::NodeResolver,
    types::*,
};
use banderwagon::{Element, Fr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tunables of a [`Trie`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrieConfig {
    /// Epoch stamped on every leaf written through the trie.
    pub epoch: StateEpoch,
    /// Minimum number of changed children of one internal node before they
    /// are recommitted in parallel.
    pub min_par_batch_size: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            epoch: StateEpoch::default(),
            min_par_batch_size: MIN_PAR_BATCH_SIZE,
        }
    }
}

/// A verkle trie rooted at an internal node.
///
/// Parts of the trie may be absent from memory; operations reaching them take
/// an optional [`NodeResolver`] to load what they need. The loaded nodes stay
/// in the trie afterwards.
#[derive(Clone, Debug, Default)]
pub struct Trie {
    root: InternalNode,
    config: TrieConfig,
    /// Last key accepted by [`Trie::insert_ordered`].
    last_ordered_key: Option<Key>,
}

impl Trie {
    /// Create an empty [`Trie`] with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrieConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Configure the minimum number of dirty siblings recommitted in parallel.
    pub fn with_min_par_batch_size(mut self, min_par_batch_size: usize) -> Self {
        self.config.min_par_batch_size = min_par_batch_size;
        self
    }

    /// Loads the root stored at the empty path. Its children start out
    /// unresolved and are loaded through the resolver passed to later calls.
    pub fn from_resolver(resolver: &dyn NodeResolver) -> Result<Self, TrieError> {
        Self::from_resolver_with_config(resolver, TrieConfig::default())
    }

    pub fn from_resolver_with_config(
        resolver: &dyn NodeResolver,
        config: TrieConfig,
    ) -> Result<Self, TrieError> {
        match resolve_node(resolver, &[])? {
            Node::Internal(root) => Ok(Self {
                root: *root,
                config,
                last_ordered_key: None,
            }),
            _ => Err(TrieError::InvalidNode {
                message: "root must be an internal node",
            }),
        }
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    pub fn epoch(&self) -> StateEpoch {
        self.config.epoch
    }

    pub fn set_epoch(&mut self, epoch: StateEpoch) {
        self.config.epoch = epoch;
    }

    pub fn root(&self) -> &InternalNode {
        &self.root
    }

    /// Writes `value` at `key`, stamping its leaf with the current epoch.
    pub fn insert(
        &mut self,
        key: &Key,
        value: Value,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        self.root.insert(key, value, self.config.epoch, resolver)
    }

    /// Bulk loads keys given in non-decreasing order.
    ///
    /// Whenever the first key byte advances, the root child holding the keys
    /// seen so far is complete: it is committed, each of its nodes is handed
    /// to `flush`, children first, and it is dropped from memory in favour of
    /// a stub. Reaching into it afterwards takes a resolver over the flushed
    /// nodes. The remaining subtree and the root are written out by a final
    /// [`Trie::flush`], which skips the unloaded slots.
    pub fn insert_ordered(
        &mut self,
        key: &Key,
        value: Value,
        flush: Option<&mut dyn FnMut(&[u8], Vec<u8>)>,
    ) -> Result<(), TrieError> {
        if let Some(last) = self.last_ordered_key {
            if *key < last {
                return Err(TrieError::UnorderedInsert);
            }
            if let (Some(sink), true) = (flush, key[0] != last[0]) {
                let index = last[0] as usize;
                let flushed = self.root.flush_slot(index, &mut Vec::new(), sink)?;
                self.root.commit_with(self.config.min_par_batch_size);
                self.root.unload_slot(index);
                debug!(index, nodes = flushed, "flushed completed subtree");
            }
        }

        self.root.insert(key, value, self.config.epoch, None)?;
        self.last_ordered_key = Some(*key);
        Ok(())
    }

    /// Removes `key`; returns whether it was present.
    pub fn delete(
        &mut self,
        key: &Key,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<bool, TrieError> {
        self.root.delete(key, resolver)
    }

    pub fn get(
        &mut self,
        key: &Key,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<Option<Value>, TrieError> {
        self.root.get(key, resolver)
    }

    /// Brings every commitment up to date and returns the root commitment.
    pub fn commit(&mut self) -> Element {
        self.root.commit_with(self.config.min_par_batch_size)
    }

    /// Root commitment mapped to the scalar field.
    pub fn hash(&mut self) -> Fr {
        self.commit().map_to_scalar_field()
    }

    /// Collects the openings for `keys`, in any order and possibly repeated.
    /// Values in the result follow the sorted, deduplicated keys.
    pub fn get_proof_items(
        &mut self,
        keys: &[Key],
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<ProofItems, TrieError> {
        let keys = Self::sorted(keys);
        self.commit();
        self.root
            .proof_items(&keys, resolver, None, self.config.min_par_batch_size)
    }

    /// Like [`Trie::get_proof_items`], reporting leaves that are expired at
    /// `epoch` instead of opening their values.
    pub fn get_proof_items_with_epoch(
        &mut self,
        keys: &[Key],
        resolver: Option<&dyn NodeResolver>,
        epoch: StateEpoch,
    ) -> Result<ProofItems, TrieError> {
        let keys = Self::sorted(keys);
        self.commit();
        self.root
            .proof_items(&keys, resolver, Some(epoch), self.config.min_par_batch_size)
    }

    fn sorted(keys: &[Key]) -> Vec<Key> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Commits, then hands every loaded node to `sink` as `(path, bytes)`,
    /// children before parents. Unresolved subtrees are skipped. Returns the
    /// number of nodes written.
    pub fn flush(&mut self, mut sink: impl FnMut(&[u8], Vec<u8>)) -> Result<usize, TrieError> {
        self.commit();
        let flushed = self.root.flush(&mut Vec::new(), &mut sink)?;
        debug!(nodes = flushed, "flushed trie");
        Ok(flushed)
    }

    /// Prunes every loaded leaf expired at `current`, keeping its stem,
    /// commitment and epoch. The root commitment does not change.
    pub fn expire(&mut self, current: StateEpoch) -> usize {
        let expired = self.root.expire_leaves(current);
        info!(%current, leaves = expired, "expired stale leaves");
        expired
    }

    /// Restores the expired leaf of `key`'s stem from `values`, stamping it
    /// with the current epoch. Fails with [`TrieError::RevivalNotFound`]
    /// unless the values reproduce the stored commitment.
    pub fn revive(
        &mut self,
        key: &Key,
        values: &[(u8, Value)],
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        self.root.revive(key, values, self.config.epoch, resolver)
    }

    /// Graphviz rendering of the loaded part of the trie.
    pub fn to_dot(&self) -> String {
        format!("digraph D {{\n{}}}\n", self.root.to_dot("", ""))
    }
}
