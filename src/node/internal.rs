//! Internal nodes: 256-way branches over one key byte.
//!
//! An internal node at depth `d` routes keys by `key[d]` and commits to the
//! hashes of its children, `C = Σ hash(child_i)·G[i]`. The commitment is
//! maintained incrementally: before a slot changes, the hash it contributed
//! is remembered, and the next commit adds `(new - old)·G[i]` for every
//! changed slot instead of recomputing the whole sum.

use super::{
    bit_is_set,
    hashed::{stub_proof_error, ExpiredNode},
    leaf::LeafNode,
    point_hex, resolve_node, set_bit, Node,
};
use crate::{
    constant::*,
    epoch::{epoch_expired, StateEpoch},
    proof::{merge_items, ExtPresence, ExtStatus, ProofItems},
    traits::NodeResolver,
    types::*,
};
use banderwagon::{Element, Fr};
use ipa_multipoint::lagrange_basis::LagrangeBasis;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Clone, Debug)]
pub struct InternalNode {
    children: Vec<Node>,
    depth: u8,
    /// Last computed commitment, `None` for a node never committed.
    commitment: Option<Element>,
    /// Slots changed since `commitment` was computed, with the hash each one
    /// contributed to it.
    dirty: BTreeMap<u8, Fr>,
}

impl Default for InternalNode {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InternalNode {
    pub fn new(depth: u8) -> Self {
        Self {
            children: vec![Node::Empty; NODE_WIDTH],
            depth,
            commitment: None,
            dirty: BTreeMap::new(),
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: u8) {
        self.depth = depth;
        for child in &mut self.children {
            child.set_depth(depth + 1);
        }
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, index: u8) -> &Node {
        &self.children[index as usize]
    }

    /// Last computed commitment; stale while changes are pending.
    pub fn commitment(&self) -> Option<Element> {
        self.commitment
    }

    /// Whether changes below this node are not yet reflected in its commitment.
    pub fn is_dirty(&self) -> bool {
        self.commitment.is_none() || !self.dirty.is_empty()
    }

    fn path<'k>(&self, key: &'k Key) -> &'k [u8] {
        &key[..self.depth as usize]
    }

    fn child_index(&self, key: &Key) -> usize {
        key[self.depth as usize] as usize
    }

    /// Loads the stub in slot `index`, if any. Returns false when the slot
    /// holds a stub and there is no resolver to load it.
    fn resolve_child(
        &mut self,
        index: usize,
        path: &[u8],
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<bool, TrieError> {
        if !self.children[index].is_stub() {
            return Ok(true);
        }
        let Some(resolver) = resolver else {
            return Ok(false);
        };
        let mut child_path = path.to_vec();
        child_path.push(index as u8);
        self.children[index] = resolve_node(resolver, &child_path)?;
        Ok(true)
    }

    /// Remembers the hash slot `index` contributed to the cached commitment
    /// before the slot is changed.
    fn touch_slot(&mut self, index: usize) {
        if self.commitment.is_none() || self.dirty.contains_key(&(index as u8)) {
            return;
        }
        // stubs are resolved before their slot can change
        if let Some(old) = self.children[index].committed_hash() {
            self.dirty.insert(index as u8, old);
        }
    }

    pub fn insert(
        &mut self,
        key: &Key,
        value: Value,
        epoch: StateEpoch,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        let index = self.child_index(key);
        if !self.resolve_child(index, self.path(key), resolver)? {
            return Err(TrieError::InsertIntoStub);
        }
        self.touch_slot(index);

        let depth = self.depth;
        let stem = stem_of(key);
        let child = &mut self.children[index];
        match child {
            Node::Empty => {
                let leaf = LeafNode::from_values(stem, [(suffix_of(key), value)], depth + 1, epoch);
                *child = Node::Leaf(Box::new(leaf));
            }
            Node::Leaf(leaf) if *leaf.stem() == stem => leaf.insert(key, value, epoch)?,
            Node::Expired(expired) if *expired.stem() == stem => {
                return Err(TrieError::Expired {
                    stem,
                    epoch: expired.epoch(),
                });
            }
            Node::Leaf(leaf) => {
                let other = *leaf.stem();
                let existing = std::mem::take(child);
                *child = Node::Internal(Box::new(Self::split(
                    existing, &other, key, value, epoch, depth + 1,
                )));
            }
            Node::Expired(expired) => {
                let other = *expired.stem();
                let existing = std::mem::take(child);
                *child = Node::Internal(Box::new(Self::split(
                    existing, &other, key, value, epoch, depth + 1,
                )));
            }
            Node::Internal(inner) => inner.insert(key, value, epoch, resolver)?,
            Node::Stub => return Err(TrieError::InsertIntoStub),
        }
        Ok(())
    }

    /// Builds the branch at `depth` separating `existing`, a leaf-level node
    /// of stem `other`, from a new leaf holding `key`. Nests one level per
    /// shared stem byte.
    fn split(
        mut existing: Node,
        other: &Stem,
        key: &Key,
        value: Value,
        epoch: StateEpoch,
        depth: u8,
    ) -> InternalNode {
        let mut branch = InternalNode::new(depth);
        let next = key[depth as usize] as usize;
        let next_other = other[depth as usize] as usize;

        if next == next_other {
            let inner = Self::split(existing, other, key, value, epoch, depth + 1);
            branch.children[next] = Node::Internal(Box::new(inner));
        } else {
            existing.set_depth(depth + 1);
            branch.children[next_other] = existing;
            let leaf =
                LeafNode::from_values(stem_of(key), [(suffix_of(key), value)], depth + 1, epoch);
            branch.children[next] = Node::Leaf(Box::new(leaf));
        }
        branch
    }

    pub fn delete(
        &mut self,
        key: &Key,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<bool, TrieError> {
        let index = self.child_index(key);
        if !self.resolve_child(index, self.path(key), resolver)? {
            return Err(TrieError::DeleteFromStub);
        }
        self.resolve_lone_sibling(index, self.path(key), resolver)?;
        self.touch_slot(index);

        let depth = self.depth;
        let child = &mut self.children[index];
        let removed = match child {
            Node::Empty => false,
            Node::Leaf(leaf) => {
                let removed = leaf.delete(key);
                if leaf.is_empty() {
                    *child = Node::Empty;
                }
                removed
            }
            Node::Expired(expired) if *expired.stem() == stem_of(key) => {
                return Err(TrieError::Expired {
                    stem: *expired.stem(),
                    epoch: expired.epoch(),
                });
            }
            Node::Expired(_) => false,
            Node::Internal(inner) => {
                let removed = inner.delete(key, resolver)?;
                if removed {
                    if let Some(mut replacement) = inner.collapse() {
                        replacement.set_depth(depth + 1);
                        *child = replacement;
                    }
                }
                removed
            }
            Node::Stub => return Err(TrieError::DeleteFromStub),
        };
        Ok(removed)
    }

    /// A deletion below slot `index` can leave the only other child of this
    /// branch to be pulled up in its place. That child is loaded before
    /// anything changes, so a failing resolver aborts the deletion whole.
    fn resolve_lone_sibling(
        &mut self,
        index: usize,
        path: &[u8],
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        if self.depth == 0 || !matches!(self.children[index], Node::Leaf(_) | Node::Internal(_)) {
            return Ok(());
        }
        let sibling = {
            let mut others = self
                .children
                .iter()
                .enumerate()
                .filter(|(other, child)| *other != index && !child.is_empty());
            match (others.next(), others.next()) {
                (Some((sibling, _)), None) => sibling,
                _ => return Ok(()),
            }
        };
        self.resolve_child(sibling, path, resolver)?;
        Ok(())
    }

    /// The node that should replace this branch after a deletion below it:
    /// `Empty` once no child is left, or the only remaining child when that
    /// child is leaf-level. A lone stub, left unresolved for lack of a
    /// resolver, stays in place.
    fn collapse(&mut self) -> Option<Node> {
        let mut present = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| !child.is_empty());
        let only = match (present.next(), present.next()) {
            (None, _) => return Some(Node::Empty),
            (Some((index, _)), None) => index,
            _ => return None,
        };
        let leaf_level = matches!(self.children[only], Node::Leaf(_) | Node::Expired(_));
        leaf_level.then(|| std::mem::take(&mut self.children[only]))
    }

    pub fn get(
        &mut self,
        key: &Key,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<Option<Value>, TrieError> {
        let index = self.child_index(key);
        if !self.resolve_child(index, self.path(key), resolver)? {
            return Err(TrieError::ReadFromStub);
        }

        match &mut self.children[index] {
            Node::Empty => Ok(None),
            Node::Leaf(leaf) => Ok(leaf.get(key)),
            Node::Expired(expired) if *expired.stem() == stem_of(key) => Err(TrieError::Expired {
                stem: *expired.stem(),
                epoch: expired.epoch(),
            }),
            Node::Expired(_) => Ok(None),
            Node::Internal(inner) => inner.get(key, resolver),
            Node::Stub => Err(TrieError::ReadFromStub),
        }
    }

    pub fn commit(&mut self) -> Element {
        self.commit_with(MIN_PAR_BATCH_SIZE)
    }

    /// Recommits the changed subtrees, in parallel once there are at least
    /// `min_par_batch_size` of them, then folds their new hashes into the
    /// cached commitment.
    ///
    /// # Panics
    ///
    /// Panics if a child that has to be recommitted is an unresolved stub.
    pub(crate) fn commit_with(&mut self, min_par_batch_size: usize) -> Element {
        if let (Some(commitment), true) = (self.commitment, self.dirty.is_empty()) {
            return commitment;
        }

        let dirty = std::mem::take(&mut self.dirty);
        let indices: Vec<usize> = match self.commitment {
            Some(_) => dirty.keys().map(|index| *index as usize).collect(),
            None => (0..NODE_WIDTH)
                .filter(|index| !self.children[*index].is_empty())
                .collect(),
        };

        let points: Vec<Element> = if indices.len() >= min_par_batch_size {
            self.children
                .par_iter_mut()
                .enumerate()
                .filter(|(index, _)| indices.binary_search(index).is_ok())
                .map(|(_, child)| child.commit_with(min_par_batch_size))
                .collect()
        } else {
            self.children
                .iter_mut()
                .enumerate()
                .filter(|(index, _)| indices.binary_search(index).is_ok())
                .map(|(_, child)| child.commit_with(min_par_batch_size))
                .collect()
        };
        let hashes = Element::batch_map_to_scalar_field(&points);

        let committer = committer();
        let commitment = match self.commitment {
            Some(cached) => dirty
                .iter()
                .zip(hashes)
                .fold(cached, |acc, ((index, old), new)| {
                    acc + committer.gi_mul_delta(old, &new, *index as usize)
                }),
            None => {
                let terms: Vec<(usize, Fr)> = indices.iter().copied().zip(hashes).collect();
                committer.commit_sparse(&terms)
            }
        };
        trace!(
            depth = self.depth,
            children = indices.len(),
            incremental = self.commitment.is_some(),
            "recommitted internal node"
        );

        self.commitment = Some(commitment);
        commitment
    }

    /// Proof items for `keys`, which must be sorted and share the path to
    /// this node.
    ///
    /// Every child enters the opened polynomial, so unresolved siblings are
    /// loaded first; without a resolver the stub's proof error is returned.
    pub(crate) fn proof_items(
        &mut self,
        keys: &[Key],
        resolver: Option<&dyn NodeResolver>,
        epoch: Option<StateEpoch>,
        min_par_batch_size: usize,
    ) -> Result<ProofItems, TrieError> {
        let Some(first) = keys.first() else {
            return Ok(ProofItems::default());
        };
        let path = self.path(first).to_vec();
        for index in 0..NODE_WIDTH {
            if !self.resolve_child(index, &path, resolver)? {
                return Err(stub_proof_error(epoch.is_some()));
            }
        }

        let commitment = self.commit_with(min_par_batch_size);
        let points: Vec<Element> = self
            .children
            .iter()
            .map(|child| child.commitment().unwrap_or_else(Element::zero))
            .collect();
        let poly = LagrangeBasis::new(Element::batch_map_to_scalar_field(&points));

        let mut items = ProofItems::default();
        items.0.by_path.insert(path.clone(), commitment);

        let depth = self.depth as usize;
        for group in keys.chunk_by(|a, b| a[depth] == b[depth]) {
            let index = group[0][depth];
            items.0.push_opening(commitment, index, poly.clone());

            match &mut self.children[index as usize] {
                Node::Empty => {
                    let stems = group
                        .chunk_by(|a, b| a[..STEM_SIZE] == b[..STEM_SIZE])
                        .count();
                    let status = ExtStatus::new(ExtPresence::AbsentEmpty, self.depth + 1);
                    items.1.extend(std::iter::repeat(status).take(stems));
                    items.0.vals.extend(std::iter::repeat(None).take(group.len()));
                }
                Node::Expired(expired) => {
                    let mut child_path = path.clone();
                    child_path.push(index);
                    items.0.by_path.insert(child_path, expired.commitment());

                    let mut last_stem = None;
                    for key in group {
                        let stem = stem_of(key);
                        if last_stem != Some(stem) {
                            last_stem = Some(stem);
                            let presence = if stem == *expired.stem() {
                                ExtPresence::Expired
                            } else {
                                ExtPresence::AbsentOther
                            };
                            items.1.push(ExtStatus::new(presence, self.depth + 1));
                            if presence == ExtPresence::AbsentOther
                                && !items.2.contains(expired.stem())
                            {
                                items.2.push(*expired.stem());
                            }
                        }
                        items.0.vals.push(None);
                    }
                }
                Node::Leaf(leaf) => merge_items(&mut items, leaf.proof_items(group, epoch)),
                Node::Internal(inner) => merge_items(
                    &mut items,
                    inner.proof_items(group, resolver, epoch, min_par_batch_size)?,
                ),
                Node::Stub => return Err(stub_proof_error(epoch.is_some())),
            }
        }

        Ok(items)
    }

    /// Revives the expired leaf of `key`'s stem from its `values`, which must
    /// reproduce the stored commitment. A live leaf of that stem is only
    /// touched.
    pub fn revive(
        &mut self,
        key: &Key,
        values: &[(u8, Value)],
        epoch: StateEpoch,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        let index = self.child_index(key);
        if !self.resolve_child(index, self.path(key), resolver)? {
            return Err(TrieError::RevivalNotFound);
        }

        let stem = stem_of(key);
        let depth = self.depth;
        let child = &mut self.children[index];
        match child {
            Node::Internal(inner) => inner.revive(key, values, epoch, resolver),
            Node::Leaf(leaf) if *leaf.stem() == stem => {
                leaf.touch(epoch);
                Ok(())
            }
            Node::Expired(expired) if *expired.stem() == stem => {
                let mut leaf = LeafNode::from_values(stem, values.iter().copied(), depth + 1, epoch);
                if leaf.is_empty() || leaf.commit() != expired.commitment() {
                    return Err(TrieError::RevivalNotFound);
                }
                debug!(
                    stem = %hex::encode(stem),
                    expired_at = %expired.epoch(),
                    %epoch,
                    "revived leaf"
                );
                *child = Node::Leaf(Box::new(leaf));
                Ok(())
            }
            _ => Err(TrieError::RevivalNotFound),
        }
    }

    /// Replaces every loaded leaf last touched before `current` expires with
    /// an [`ExpiredNode`]. Commitments are unaffected.
    pub(crate) fn expire_leaves(&mut self, current: StateEpoch) -> usize {
        let mut expired = 0;
        for child in &mut self.children {
            match child {
                Node::Leaf(leaf) if epoch_expired(leaf.epoch(), current) => {
                    let node = ExpiredNode::new(*leaf.stem(), leaf.commit(), leaf.epoch());
                    *child = Node::Expired(Box::new(node));
                    expired += 1;
                }
                Node::Internal(inner) => expired += inner.expire_leaves(current),
                _ => {}
            }
        }
        expired
    }

    /// Hands every loaded node of this subtree to `sink`, children before
    /// parents. `path` is the path of this node.
    pub(crate) fn flush(
        &mut self,
        path: &mut Vec<u8>,
        sink: &mut dyn FnMut(&[u8], Vec<u8>),
    ) -> Result<usize, TrieError> {
        let mut flushed = 0;
        for index in 0..NODE_WIDTH {
            flushed += self.flush_slot(index, path, sink)?;
        }
        sink(path, self.serialize());
        Ok(flushed + 1)
    }

    /// Flushes the subtree in slot `index`; stubs and empty slots are skipped.
    pub(crate) fn flush_slot(
        &mut self,
        index: usize,
        path: &mut Vec<u8>,
        sink: &mut dyn FnMut(&[u8], Vec<u8>),
    ) -> Result<usize, TrieError> {
        path.push(index as u8);
        let child = &mut self.children[index];
        let flushed = match child {
            Node::Internal(inner) => inner.flush(path, sink),
            Node::Leaf(_) | Node::Expired(_) => child.serialize().map(|bytes| {
                sink(path, bytes);
                1
            }),
            Node::Empty | Node::Stub => Ok(0),
        };
        path.pop();
        flushed
    }

    /// Drops the subtree in slot `index` from memory, leaving a stub. The
    /// slot must already be folded into this node's commitment and its nodes
    /// written out, so that a resolver can load it back.
    pub(crate) fn unload_slot(&mut self, index: usize) {
        debug_assert!(
            self.commitment.is_some() && !self.dirty.contains_key(&(index as u8)),
            "unloading a slot with uncommitted changes"
        );
        if !self.children[index].is_empty() {
            self.children[index] = Node::Stub;
        }
    }

    /// `[type][bitlist][commitment]`. Commits first if changes are pending.
    pub fn serialize(&mut self) -> Vec<u8> {
        let commitment = self.commit();

        let mut bitlist = [0u8; BITLIST_SIZE];
        for (index, child) in self.children.iter().enumerate() {
            if !child.is_empty() {
                set_bit(&mut bitlist, index);
            }
        }

        let mut bytes = Vec::with_capacity(INTERNAL_NODE_SIZE);
        bytes.push(INTERNAL_TYPE);
        bytes.extend_from_slice(&bitlist);
        bytes.extend_from_slice(&commitment.to_bytes_uncompressed());
        bytes
    }

    /// Children flagged in the bitlist come back as stubs.
    pub(crate) fn parse(bytes: &[u8], depth: u8) -> Result<Self, TrieError> {
        if bytes.len() != INTERNAL_NODE_SIZE || bytes[0] != INTERNAL_TYPE {
            return Err(TrieError::InvalidNode {
                message: "internal node must be 97 bytes",
            });
        }
        // branching stops where stems end
        if depth as usize >= STEM_SIZE {
            return Err(TrieError::InvalidNode {
                message: "internal node below stem depth",
            });
        }

        let bitlist = &bytes[INTERNAL_BITLIST_OFFSET..INTERNAL_COMMITMENT_OFFSET];
        let children = (0..NODE_WIDTH)
            .map(|index| {
                if bit_is_set(bitlist, index) {
                    Node::Stub
                } else {
                    Node::Empty
                }
            })
            .collect();

        Ok(Self {
            children,
            depth,
            commitment: Some(read_point(&bytes[INTERNAL_COMMITMENT_OFFSET..])?),
            dirty: BTreeMap::new(),
        })
    }

    pub fn to_dot(&self, parent: &str, path: &str) -> String {
        let me = format!("internal{path}");
        let mut dot = format!("{me} [label=\"I: {}\"]\n", point_hex(self.commitment));
        if !parent.is_empty() {
            dot.push_str(&format!("{parent} -> {me}\n"));
        }
        for (index, child) in self.children.iter().enumerate() {
            dot.push_str(&child.to_dot(&me, &format!("{path}{index:02x}")));
        }
        dot
    }
}
