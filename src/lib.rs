//! This crate implements a Verkle trie: an authenticated map from 32-byte
//! keys to 32-byte values in which every node commits to its children with a
//! Pedersen vector commitment over the banderwagon curve.
//!
//! The trie branches 256 ways on each key byte. Keys sharing their first 31
//! bytes (the stem) live in one leaf, which commits to up to 256 values.
//! Internal nodes commit to the scalar maps of their children's commitments,
//! so the root commitment authenticates the entire state.
//!
//! Not every node has to be in memory. A subtree that exists only in a
//! backing store is represented by a stub, and operations that need to look
//! past one call a caller-supplied [`NodeResolver`] with the stub's path.
//! Leaves that went untouched for too long can be pruned to expired nodes
//! that keep only their commitment, and later be revived from their values.
//!
//! The crate is divided into the following modules:
//! - `node`: the node model, its commitments and its wire format
//! - `trie`: the [`Trie`] engine and its [`StatelessTrie`] counterpart
//! - `proof`: the inputs of a multi-point opening proof
//! - `epoch`: [`StateEpoch`] and the expiry rule

pub mod constant;
pub mod epoch;
pub use epoch::{bytes_to_epoch, epoch_expired, epoch_to_bytes, StateEpoch};
pub mod mem_store;
pub use mem_store::MemStore;
pub mod node;
pub use node::Node;
pub mod proof;
pub use proof::{ExtPresence, ExtStatus, ProofElements, ProofItems};
pub mod traits;
pub use traits::{NodeResolver, ResolverError};
pub mod trie;
pub use trie::{
    stateless::StatelessTrie,
    trie::{Trie, TrieConfig},
};
pub mod types;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn lazy_trie_over_closure_resolver() {
        let mut trie = Trie::new();
        let mut keys = Vec::new();
        for i in 0..16u8 {
            let mut key = [i; 32];
            key[31] = 0;
            trie.insert(&key, [i; 32], None).unwrap();
            keys.push(key);
        }
        let store = MemStore::new();
        trie.flush(|path, bytes| store.put(path, bytes)).unwrap();

        let calls = AtomicUsize::new(0);
        let resolver = |path: &[u8]| {
            calls.fetch_add(1, Ordering::Relaxed);
            store.resolve(path)
        };

        let mut lazy = Trie::from_resolver(&resolver).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(lazy.get(&keys[5], Some(&resolver)).unwrap(), Some([5u8; 32]));
        assert_eq!(lazy.get(&keys[5], Some(&resolver)).unwrap(), Some([5u8; 32]));
        assert_eq!(calls.load(Ordering::Relaxed), 2, "resolved nodes stay loaded");

        lazy.delete(&keys[5], Some(&resolver)).unwrap();
        trie.delete(&keys[5], None).unwrap();
        assert_eq!(lazy.hash(), trie.hash());
    }
}
