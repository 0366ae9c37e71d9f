//! A trie that replays the writes covered by a proof.
//!
//! [`StatelessTrie`] starts from a bare root and is only ever grown through
//! single-key inserts. Its commitment is recomputed after every change, so a
//! verifier can compare roots step by step. Ordered bulk loading assumes the
//! full key set and is rejected.

use super::trie::{Trie, TrieConfig};
use crate::{epoch::StateEpoch, proof::ProofItems, types::*};
use banderwagon::{Element, Fr};

#[derive(Clone, Debug)]
pub struct StatelessTrie {
    trie: Trie,
    commitment: Element,
    hash: Fr,
}

impl Default for StatelessTrie {
    fn default() -> Self {
        Self::with_config(TrieConfig::default())
    }
}

impl StatelessTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrieConfig) -> Self {
        let mut trie = Trie::with_config(config);
        let commitment = trie.commit();
        Self {
            trie,
            commitment,
            hash: commitment.map_to_scalar_field(),
        }
    }

    /// Root commitment after the last change.
    pub fn commitment(&self) -> Element {
        self.commitment
    }

    pub fn hash(&self) -> Fr {
        self.hash
    }

    pub fn epoch(&self) -> StateEpoch {
        self.trie.epoch()
    }

    pub fn set_epoch(&mut self, epoch: StateEpoch) {
        self.trie.set_epoch(epoch);
    }

    pub fn insert(&mut self, key: &Key, value: Value) -> Result<(), TrieError> {
        self.trie.insert(key, value, None)?;
        self.refresh();
        Ok(())
    }

    pub fn delete(&mut self, key: &Key) -> Result<bool, TrieError> {
        let removed = self.trie.delete(key, None)?;
        if removed {
            self.refresh();
        }
        Ok(removed)
    }

    pub fn get(&mut self, key: &Key) -> Result<Option<Value>, TrieError> {
        self.trie.get(key, None)
    }

    /// Always fails: a stateless trie never holds the complete key range a
    /// bulk load relies on. The trie is left as it was.
    pub fn insert_ordered(
        &mut self,
        _key: &Key,
        _value: Value,
        _flush: Option<&mut dyn FnMut(&[u8], Vec<u8>)>,
    ) -> Result<(), TrieError> {
        Err(TrieError::UnsupportedOperation {
            operation: "insert_ordered",
        })
    }

    pub fn get_proof_items(&mut self, keys: &[Key]) -> Result<ProofItems, TrieError> {
        self.trie.get_proof_items(keys, None)
    }

    /// The underlying trie.
    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    fn refresh(&mut self) {
        self.commitment = self.trie.commit();
        self.hash = self.commitment.map_to_scalar_field();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    const ZERO_KEY: Key = [0u8; 32];
    const ONE_KEY: Key = {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    };
    const FOURTY_KEY: Key = {
        let mut key = [0u8; 32];
        key[0] = 0x40;
        key
    };

    fn reference(entries: &[(Key, Value)]) -> Trie {
        let mut trie = Trie::new();
        for (key, value) in entries {
            trie.insert(key, *value, None).unwrap();
        }
        trie
    }

    #[test]
    fn delete_restores_commitment() {
        let mut root = StatelessTrie::new();
        root.insert(&ZERO_KEY, FOURTY_KEY).unwrap();
        let single = root.commitment();

        root.insert(&ONE_KEY, FOURTY_KEY).unwrap();
        assert_ne!(root.commitment(), single, "second insert didn't update");

        assert!(root.delete(&ONE_KEY).unwrap());
        assert_eq!(root.commitment(), single);

        let mut reference = reference(&[(ZERO_KEY, FOURTY_KEY), (ONE_KEY, FOURTY_KEY)]);
        reference.delete(&ONE_KEY, None).unwrap();
        assert_eq!(reference.commit(), root.commitment());
        assert_eq!(reference.hash(), root.hash());
    }

    #[test]
    fn insert_leaf_into_root() {
        let mut root = StatelessTrie::new();
        root.insert(&ZERO_KEY, FOURTY_KEY).unwrap();
        assert_eq!(reference(&[(ZERO_KEY, FOURTY_KEY)]).commit(), root.commitment());

        root.insert(&ZERO_KEY, ONE_KEY).unwrap();
        assert_eq!(reference(&[(ZERO_KEY, ONE_KEY)]).commit(), root.commitment());
    }

    #[test]
    fn insert_leaf_into_leaf() {
        let mut root = StatelessTrie::new();
        root.insert(&ZERO_KEY, FOURTY_KEY).unwrap();
        root.insert(&ONE_KEY, FOURTY_KEY).unwrap();
        assert_eq!(
            reference(&[(ZERO_KEY, FOURTY_KEY), (ONE_KEY, FOURTY_KEY)]).commit(),
            root.commitment()
        );

        root.insert(&ONE_KEY, ONE_KEY).unwrap();
        assert_eq!(
            reference(&[(ZERO_KEY, FOURTY_KEY), (ONE_KEY, ONE_KEY)]).commit(),
            root.commitment()
        );
    }

    #[test]
    fn insert_leaf_into_internal() {
        let key1: Key = hex::decode("0000100000000000000000000000000000000000000000000000000000000000")
            .unwrap()
            .try_into()
            .unwrap();
        let mut root = StatelessTrie::new();
        root.insert(&ZERO_KEY, FOURTY_KEY).unwrap();
        root.insert(&key1, FOURTY_KEY).unwrap();

        assert_eq!(
            reference(&[(ZERO_KEY, FOURTY_KEY), (key1, FOURTY_KEY)]).commit(),
            root.commitment()
        );
        assert_eq!(root.get(&key1).unwrap(), Some(FOURTY_KEY));
    }

    #[test]
    fn insert_ordered_is_unsupported() {
        let mut root = StatelessTrie::new();
        root.insert(&ZERO_KEY, FOURTY_KEY).unwrap();
        let before = root.commitment();

        let err = root.insert_ordered(&ONE_KEY, FOURTY_KEY, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.to_string(), "operation 'insert_ordered' not supported");

        assert_eq!(root.get(&ONE_KEY).unwrap(), None);
        assert_eq!(root.trie().clone().commit(), before);
        assert_eq!(root.commitment(), before);
    }

    #[test]
    fn empty_root_is_identity() {
        let root = StatelessTrie::new();
        assert!(root.commitment().is_zero());
        assert_eq!(root.epoch(), StateEpoch(0));
    }

    #[test]
    fn proof_items_match_full_trie() {
        let mut root = StatelessTrie::new();
        root.insert(&ZERO_KEY, FOURTY_KEY).unwrap();
        root.insert(&FOURTY_KEY, ONE_KEY).unwrap();

        let (elements, statuses, _) = root.get_proof_items(&[FOURTY_KEY]).unwrap();
        let mut full = reference(&[(ZERO_KEY, FOURTY_KEY), (FOURTY_KEY, ONE_KEY)]);
        let (expected, expected_statuses, _) = full.get_proof_items(&[FOURTY_KEY], None).unwrap();
        assert_eq!(elements.cis, expected.cis);
        assert_eq!(elements.vals, vec![Some(ONE_KEY)]);
        assert_eq!(statuses, expected_statuses);
    }
}
