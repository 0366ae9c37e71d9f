//! Leaf nodes: up to 256 values sharing one stem.
//!
//! A leaf commits to its values in two halves. `C1` covers suffixes below
//! 128 and `C2` the rest; each value takes two slots, its low 16 bytes plus
//! a 2^128 marker (so a present zero value differs from an absent one) and
//! its high 16 bytes. The extension commitment `C` binds the marker `1`, the
//! stem and the hashes of both halves:
//!
//! ```text
//! C = 1·G0 + stem·G1 + hash(C1)·G2 + hash(C2)·G3
//! ```
//!
//! The epoch a leaf was last touched in is stored next to the values but is
//! not committed to.

use super::{bit_is_set, point_hex, set_bit};
use crate::{
    constant::*,
    epoch::{bytes_to_epoch, epoch_expired, epoch_to_bytes, StateEpoch},
    proof::{ExtPresence, ExtStatus, ProofItems},
    types::*,
};
use banderwagon::{
    trait_defs::{One, PrimeField, Zero},
    Element, Fr,
};
use ipa_multipoint::lagrange_basis::LagrangeBasis;
use std::collections::BTreeMap;
use tracing::trace;

/// The three commitments of a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafCommitments {
    pub c: Element,
    pub c1: Element,
    pub c2: Element,
}

#[derive(Clone, Debug)]
pub struct LeafNode {
    stem: Stem,
    values: BTreeMap<u8, Value>,
    depth: u8,
    epoch: StateEpoch,
    /// Cleared by every value change.
    commitments: Option<LeafCommitments>,
}

impl LeafNode {
    pub fn new(stem: Stem, depth: u8, epoch: StateEpoch) -> Self {
        Self {
            stem,
            values: BTreeMap::new(),
            depth,
            epoch,
            commitments: None,
        }
    }

    pub fn from_values(
        stem: Stem,
        values: impl IntoIterator<Item = (u8, Value)>,
        depth: u8,
        epoch: StateEpoch,
    ) -> Self {
        Self {
            values: values.into_iter().collect(),
            ..Self::new(stem, depth, epoch)
        }
    }

    pub fn stem(&self) -> &Stem {
        &self.stem
    }

    pub fn values(&self) -> &BTreeMap<u8, Value> {
        &self.values
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: u8) {
        self.depth = depth;
    }

    pub fn epoch(&self) -> StateEpoch {
        self.epoch
    }

    /// Marks the leaf as accessed in `epoch` without changing any value.
    pub fn touch(&mut self, epoch: StateEpoch) {
        self.epoch = epoch;
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert(&mut self, key: &Key, value: Value, epoch: StateEpoch) -> Result<(), TrieError> {
        if stem_of(key) != self.stem {
            return Err(TrieError::InsertIntoOtherStem);
        }
        self.values.insert(suffix_of(key), value);
        self.epoch = epoch;
        self.commitments = None;
        Ok(())
    }

    /// Removes the value of `key`; false if the leaf did not hold it.
    pub fn delete(&mut self, key: &Key) -> bool {
        if stem_of(key) != self.stem || self.values.remove(&suffix_of(key)).is_none() {
            return false;
        }
        self.commitments = None;
        true
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        if stem_of(key) != self.stem {
            return None;
        }
        self.values.get(&suffix_of(key)).copied()
    }

    /// Cached commitments, `None` if values changed since the last commit.
    pub fn commitments(&self) -> Option<LeafCommitments> {
        self.commitments
    }

    pub fn commitment(&self) -> Option<Element> {
        self.commitments.map(|c| c.c)
    }

    pub fn commit(&mut self) -> Element {
        self.commit_all().c
    }

    fn commit_all(&mut self) -> LeafCommitments {
        if let Some(commitments) = self.commitments {
            return commitments;
        }

        let committer = committer();
        let c1 = committer.commit_lagrange(&suffix_poly(&self.values, false));
        let c2 = committer.commit_lagrange(&suffix_poly(&self.values, true));
        let c = committer.commit_lagrange(&extension_poly(&self.stem, &c1, &c2));
        trace!(
            stem = %hex::encode(self.stem),
            values = self.values.len(),
            "recommitted leaf"
        );

        let commitments = LeafCommitments { c, c1, c2 };
        self.commitments = Some(commitments);
        commitments
    }

    /// Openings proving the presence or absence of `keys`, all of which
    /// were routed to this leaf and are sorted.
    ///
    /// With an `epoch`, keys of this stem are reported as expired instead of
    /// opened when the leaf was last touched too long before it.
    pub(crate) fn proof_items(&mut self, keys: &[Key], epoch: Option<StateEpoch>) -> ProofItems {
        let LeafCommitments { c, c1, c2 } = self.commit_all();
        let ext = LagrangeBasis::new(extension_poly(&self.stem, &c1, &c2));
        let expired = epoch.is_some_and(|epoch| epoch_expired(self.epoch, epoch));

        let mut items = ProofItems::default();
        let (elements, statuses, other_stems) = &mut items;
        if let Some(first) = keys.first() {
            elements.by_path.insert(first[..self.depth as usize].to_vec(), c);
        }
        elements.push_opening(c, 0, ext.clone());
        elements.push_opening(c, 1, ext.clone());

        let own: Vec<&Key> = keys.iter().filter(|k| stem_of(k) == self.stem).collect();
        if !expired {
            if own.iter().any(|k| suffix_of(k) < 128) {
                elements.push_opening(c, 2, ext.clone());
            }
            if own.iter().any(|k| suffix_of(k) >= 128) {
                elements.push_opening(c, 3, ext);
            }
        }

        let lower = LagrangeBasis::new(suffix_poly(&self.values, false));
        let upper = LagrangeBasis::new(suffix_poly(&self.values, true));
        let mut last_stem = None;
        for key in keys {
            let stem = stem_of(key);
            let new_stem = last_stem != Some(stem);
            last_stem = Some(stem);

            if stem != self.stem {
                if new_stem {
                    statuses.push(ExtStatus::new(ExtPresence::AbsentOther, self.depth));
                    if other_stems.is_empty() {
                        other_stems.push(self.stem);
                    }
                }
                elements.vals.push(None);
                continue;
            }

            if expired {
                if new_stem {
                    statuses.push(ExtStatus::new(ExtPresence::Expired, self.depth));
                }
                elements.vals.push(None);
                continue;
            }

            let suffix = suffix_of(key);
            let (commitment, poly) = if suffix < 128 { (c1, &lower) } else { (c2, &upper) };
            let slot = 2 * (suffix % 128);
            elements.push_opening(commitment, slot, poly.clone());
            elements.push_opening(commitment, slot + 1, poly.clone());
            elements.vals.push(self.values.get(&suffix).copied());
            if new_stem {
                statuses.push(ExtStatus::new(ExtPresence::Present, self.depth));
            }
        }

        items
    }

    /// `[type][stem][bitlist][C][C1][C2][epoch][values]`, values in suffix order.
    pub fn serialize(&mut self) -> Vec<u8> {
        let LeafCommitments { c, c1, c2 } = self.commit_all();

        let mut bitlist = [0u8; BITLIST_SIZE];
        for suffix in self.values.keys() {
            set_bit(&mut bitlist, *suffix as usize);
        }

        let mut bytes = Vec::with_capacity(LEAF_VALUES_OFFSET + VALUE_SIZE * self.values.len());
        bytes.push(LEAF_TYPE);
        bytes.extend_from_slice(&self.stem);
        bytes.extend_from_slice(&bitlist);
        for point in [c, c1, c2] {
            bytes.extend_from_slice(&point.to_bytes_uncompressed());
        }
        bytes.extend_from_slice(&epoch_to_bytes(self.epoch));
        for value in self.values.values() {
            bytes.extend_from_slice(value);
        }
        bytes
    }

    pub(crate) fn parse(bytes: &[u8], depth: u8) -> Result<Self, TrieError> {
        if bytes.len() < LEAF_VALUES_OFFSET || bytes[0] != LEAF_TYPE {
            return Err(TrieError::InvalidNode { message: "truncated leaf node" });
        }

        let bitlist = &bytes[LEAF_BITLIST_OFFSET..LEAF_COMMITMENT_OFFSET];
        let suffixes: Vec<u8> = (0..NODE_WIDTH)
            .filter(|i| bit_is_set(bitlist, *i))
            .map(|i| i as u8)
            .collect();
        if suffixes.is_empty() {
            return Err(TrieError::InvalidNode { message: "leaf node without values" });
        }
        if bytes.len() != LEAF_VALUES_OFFSET + VALUE_SIZE * suffixes.len() {
            return Err(TrieError::InvalidNode {
                message: "leaf length does not match its bitlist",
            });
        }

        let stem: Stem = bytes[LEAF_STEM_OFFSET..LEAF_BITLIST_OFFSET]
            .try_into()
            .map_err(|_| TrieError::InvalidNode { message: "bad stem" })?;
        let commitments = LeafCommitments {
            c: read_point(&bytes[LEAF_COMMITMENT_OFFSET..LEAF_C1_OFFSET])?,
            c1: read_point(&bytes[LEAF_C1_OFFSET..LEAF_C2_OFFSET])?,
            c2: read_point(&bytes[LEAF_C2_OFFSET..LEAF_EPOCH_OFFSET])?,
        };
        let epoch = bytes_to_epoch(&bytes[LEAF_EPOCH_OFFSET..LEAF_VALUES_OFFSET]);

        let mut values = BTreeMap::new();
        for (suffix, chunk) in suffixes
            .into_iter()
            .zip(bytes[LEAF_VALUES_OFFSET..].chunks_exact(VALUE_SIZE))
        {
            let value: Value = chunk
                .try_into()
                .map_err(|_| TrieError::InvalidNode { message: "bad value" })?;
            values.insert(suffix, value);
        }

        Ok(Self {
            stem,
            values,
            depth,
            epoch,
            commitments: Some(commitments),
        })
    }

    pub fn to_dot(&self, parent: &str, path: &str) -> String {
        let commitments = self.commitments;
        let mut dot = format!(
            "leaf{path} [label=\"L: {}\\nC: {}\\nC1: {}\\nC2: {}\"]\n{parent} -> leaf{path}\n",
            hex::encode(self.stem),
            point_hex(commitments.map(|c| c.c)),
            point_hex(commitments.map(|c| c.c1)),
            point_hex(commitments.map(|c| c.c2)),
        );
        for (suffix, value) in &self.values {
            dot.push_str(&format!(
                "val{path}{suffix:02x} [label=\"{}\"]\nleaf{path} -> val{path}{suffix:02x}\n",
                hex::encode(value)
            ));
        }
        dot
    }
}

/// `[1, stem, hash(C1), hash(C2), 0, ...]`
fn extension_poly(stem: &Stem, c1: &Element, c2: &Element) -> Vec<Fr> {
    let mut poly = vec![Fr::zero(); NODE_WIDTH];
    poly[0] = Fr::one();
    poly[1] = Fr::from_le_bytes_mod_order(stem);
    poly[2] = c1.map_to_scalar_field();
    poly[3] = c2.map_to_scalar_field();
    poly
}

/// Evaluations committed by `C1` (or `C2` when `upper`).
fn suffix_poly(values: &BTreeMap<u8, Value>, upper: bool) -> Vec<Fr> {
    let mut poly = vec![Fr::zero(); NODE_WIDTH];
    let range = if upper { 128..=u8::MAX } else { 0..=127 };
    for (suffix, value) in values.range(range) {
        let slot = 2 * (*suffix as usize % 128);

        let mut low = [0u8; 17];
        low[..16].copy_from_slice(&value[..16]);
        low[16] = 1;
        poly[slot] = Fr::from_le_bytes_mod_order(&low);
        poly[slot + 1] = Fr::from_le_bytes_mod_order(&value[16..]);
    }
    poly
}

#[cfg(test)]
mod tests {
    use super::*;
    use banderwagon::trait_defs::Field;

    fn key(stem_byte: u8, suffix: u8) -> Key {
        let mut key = [stem_byte; KEY_SIZE];
        key[STEM_SIZE] = suffix;
        key
    }

    #[test]
    fn insert_get_delete() {
        let mut leaf = LeafNode::new(stem_of(&key(1, 0)), 1, StateEpoch(0));
        leaf.insert(&key(1, 3), [3u8; 32], StateEpoch(4)).unwrap();
        leaf.insert(&key(1, 200), [200u8; 32], StateEpoch(5)).unwrap();

        assert_eq!(leaf.get(&key(1, 3)), Some([3u8; 32]));
        assert_eq!(leaf.get(&key(1, 4)), None);
        assert_eq!(leaf.get(&key(2, 3)), None);
        assert_eq!(leaf.epoch(), StateEpoch(5));

        assert!(matches!(
            leaf.insert(&key(2, 3), [0u8; 32], StateEpoch(5)),
            Err(TrieError::InsertIntoOtherStem)
        ));

        assert!(!leaf.delete(&key(2, 3)));
        assert!(!leaf.delete(&key(1, 4)));
        assert!(leaf.delete(&key(1, 3)));
        assert_eq!(leaf.values().len(), 1);
    }

    #[test]
    fn commitment_cache_is_invalidated() {
        let mut leaf = LeafNode::new(stem_of(&key(1, 0)), 1, StateEpoch(0));
        leaf.insert(&key(1, 0), [1u8; 32], StateEpoch(0)).unwrap();
        let first = leaf.commit();
        assert_eq!(leaf.commitment(), Some(first));

        leaf.insert(&key(1, 0), [2u8; 32], StateEpoch(0)).unwrap();
        assert_eq!(leaf.commitment(), None);
        assert_ne!(leaf.commit(), first);

        leaf.insert(&key(1, 0), [1u8; 32], StateEpoch(9)).unwrap();
        assert_eq!(leaf.commit(), first, "epoch is not committed");
    }

    #[test]
    fn commitment_matches_formula() {
        let mut value = [0u8; 32];
        value[0] = 5;
        value[16] = 7;
        let mut leaf = LeafNode::from_values(stem_of(&key(9, 0)), [(130, value)], 1, StateEpoch(0));
        let LeafCommitments { c, c1, c2 } = leaf.commit_all();

        let crs = crs();
        let two_128 = Fr::from(1u64 << 32).square().square();
        assert_eq!(c1, Element::zero());
        assert_eq!(c2, crs[4] * (Fr::from(5u64) + two_128) + crs[5] * Fr::from(7u64));

        let stem = Fr::from_le_bytes_mod_order(&[9u8; STEM_SIZE]);
        let expected = crs[0] + crs[1] * stem + crs[3] * c2.map_to_scalar_field();
        assert_eq!(c, expected);
    }

    #[test]
    fn present_zero_differs_from_absent() {
        let stem = stem_of(&key(4, 0));
        let mut with_zero = LeafNode::from_values(stem, [(0, [0u8; 32]), (1, [1u8; 32])], 1, StateEpoch(0));
        let mut without = LeafNode::from_values(stem, [(1, [1u8; 32])], 1, StateEpoch(0));
        assert_ne!(with_zero.commit(), without.commit());
    }

    #[test]
    fn serialize_parse() {
        let stem = stem_of(&key(3, 0));
        let mut leaf = LeafNode::from_values(
            stem,
            [(0, [1u8; 32]), (127, [2u8; 32]), (255, [3u8; 32])],
            2,
            StateEpoch(0x0102),
        );
        let bytes = leaf.serialize();
        assert_eq!(bytes.len(), LEAF_VALUES_OFFSET + 3 * VALUE_SIZE);
        assert_eq!(bytes[0], LEAF_TYPE);
        assert_eq!(&bytes[LEAF_STEM_OFFSET..LEAF_BITLIST_OFFSET], &stem);
        assert_eq!(&bytes[LEAF_EPOCH_OFFSET..LEAF_VALUES_OFFSET], &[0x01, 0x02]);

        let parsed = LeafNode::parse(&bytes, 2).unwrap();
        assert_eq!(parsed.values(), leaf.values());
        assert_eq!(parsed.epoch(), StateEpoch(0x0102));
        assert_eq!(parsed.commitments(), leaf.commitments());
    }

    #[test]
    fn parse_rejects_malformed() {
        let mut leaf = LeafNode::from_values(stem_of(&key(3, 0)), [(5, [1u8; 32])], 1, StateEpoch(1));
        let bytes = leaf.serialize();

        assert!(LeafNode::parse(&bytes[..bytes.len() - 1], 1).is_err());
        assert!(LeafNode::parse(&bytes[..40], 1).is_err());

        let mut no_values = bytes.clone();
        no_values[LEAF_BITLIST_OFFSET..LEAF_COMMITMENT_OFFSET].fill(0);
        assert!(LeafNode::parse(&no_values[..LEAF_VALUES_OFFSET], 1).is_err());

        let mut bad_point = bytes.clone();
        bad_point[LEAF_C1_OFFSET..LEAF_C2_OFFSET].fill(0xff);
        assert!(matches!(
            LeafNode::parse(&bad_point, 1),
            Err(TrieError::InvalidNode { .. })
        ));
    }

    #[test]
    fn proof_items_present_and_absent() {
        let stem = stem_of(&key(1, 0));
        let mut leaf =
            LeafNode::from_values(stem, [(3, [3u8; 32]), (200, [200u8; 32])], 1, StateEpoch(0));
        let keys = [key(1, 3), key(1, 4), key(1, 200)];

        let (elements, statuses, others) = leaf.proof_items(&keys, None);
        assert_eq!(statuses, vec![ExtStatus::new(ExtPresence::Present, 1)]);
        assert!(others.is_empty());
        assert_eq!(elements.vals, vec![Some([3u8; 32]), None, Some([200u8; 32])]);
        // 0, 1, 2, 3 on C and two per key on C1/C2
        assert_eq!(elements.num_openings(), 4 + 6);

        let crs = crs();
        for i in 0..elements.num_openings() {
            assert_eq!(crs.commit_lagrange_poly(&elements.fis[i]), elements.cis[i]);
            assert_eq!(
                elements.fis[i].evaluate_in_domain(elements.zis[i] as usize),
                elements.yis[i]
            );
        }

        let (elements, statuses, others) = leaf.proof_items(&[key(2, 0)], None);
        assert_eq!(statuses, vec![ExtStatus::new(ExtPresence::AbsentOther, 1)]);
        assert_eq!(others, vec![stem]);
        assert_eq!(elements.vals, vec![None]);
        assert_eq!(elements.num_openings(), 2);
    }

    #[test]
    fn proof_items_expired() {
        let mut leaf =
            LeafNode::from_values(stem_of(&key(1, 0)), [(3, [3u8; 32])], 1, StateEpoch(1));

        let (elements, statuses, _) = leaf.proof_items(&[key(1, 3)], Some(StateEpoch(3)));
        assert_eq!(statuses, vec![ExtStatus::new(ExtPresence::Expired, 1)]);
        assert_eq!(elements.vals, vec![None]);
        assert_eq!(elements.num_openings(), 2);

        let (elements, statuses, _) = leaf.proof_items(&[key(1, 3)], Some(StateEpoch(2)));
        assert_eq!(statuses, vec![ExtStatus::new(ExtPresence::Present, 1)]);
        assert_eq!(elements.vals, vec![Some([3u8; 32])]);
    }
}
