//! The node model.
//!
//! A trie node is one of five variants, see [`Node`]. Every operation of the
//! trie dispatches on the variant of the node it reaches, so the set is
//! closed and matched exhaustively.

mod hashed;
mod internal;
mod leaf;

pub use hashed::ExpiredNode;
pub use internal::InternalNode;
pub use leaf::{LeafCommitments, LeafNode};

use crate::{
    constant::*,
    epoch::StateEpoch,
    proof::ProofItems,
    traits::NodeResolver,
    types::{Key, TrieError, Value},
};
use banderwagon::{trait_defs::Zero, Element, Fr};
use hashed::{stub_proof_error, unresolved_dot};
use tracing::debug;

/// One node of the trie.
#[derive(Clone, Debug, Default)]
pub enum Node {
    /// Nothing is stored below this slot.
    #[default]
    Empty,
    Leaf(Box<LeafNode>),
    Internal(Box<InternalNode>),
    /// A subtree exists but is not loaded. Rejects every operation; the
    /// parent replaces it with the node its resolver returns.
    Stub,
    /// A pruned leaf that keeps only its stem, commitment and epoch.
    Expired(Box<ExpiredNode>),
}

impl Node {
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Node::Stub)
    }

    /// Writes `value` at `key`, stamping the touched leaf with `epoch`.
    ///
    /// Only internal nodes route keys; an empty slot or a placeholder cannot
    /// be written in place, and a leaf only accepts keys of its own stem.
    pub fn insert(
        &mut self,
        key: &Key,
        value: Value,
        epoch: StateEpoch,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        match self {
            Node::Empty => Err(TrieError::InsertIntoEmpty),
            Node::Leaf(leaf) => leaf.insert(key, value, epoch),
            Node::Internal(internal) => internal.insert(key, value, epoch, resolver),
            Node::Stub | Node::Expired(_) => Err(TrieError::InsertIntoStub),
        }
    }

    /// Removes the value at `key`; returns whether there was one.
    pub fn delete(
        &mut self,
        key: &Key,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<bool, TrieError> {
        match self {
            Node::Empty => Ok(false),
            Node::Leaf(leaf) => Ok(leaf.delete(key)),
            Node::Internal(internal) => internal.delete(key, resolver),
            Node::Stub | Node::Expired(_) => Err(TrieError::DeleteFromStub),
        }
    }

    /// Reads the value at `key`. Stubs met on the way are loaded and kept.
    pub fn get(
        &mut self,
        key: &Key,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<Option<Value>, TrieError> {
        match self {
            Node::Empty => Ok(None),
            Node::Leaf(leaf) => Ok(leaf.get(key)),
            Node::Internal(internal) => internal.get(key, resolver),
            Node::Stub | Node::Expired(_) => Err(TrieError::ReadFromStub),
        }
    }

    /// Computes the commitment of this subtree, reusing cached parts.
    ///
    /// # Panics
    ///
    /// Panics on an unresolved [`Node::Stub`], which has no commitment.
    pub fn commit(&mut self) -> Element {
        self.commit_with(MIN_PAR_BATCH_SIZE)
    }

    pub(crate) fn commit_with(&mut self, min_par_batch_size: usize) -> Element {
        match self {
            Node::Empty => Element::zero(),
            Node::Leaf(leaf) => leaf.commit(),
            Node::Internal(internal) => internal.commit_with(min_par_batch_size),
            Node::Stub => panic!("cannot commit an unresolved node"),
            Node::Expired(expired) => expired.commitment(),
        }
    }

    /// Cached commitment, without computing anything.
    pub fn commitment(&self) -> Option<Element> {
        match self {
            Node::Empty | Node::Stub => None,
            Node::Leaf(leaf) => leaf.commitment(),
            Node::Internal(internal) => internal.commitment(),
            Node::Expired(expired) => Some(expired.commitment()),
        }
    }

    /// The hash this node contributed to its parent at the parent's last
    /// commit. `None` for stubs.
    pub(crate) fn committed_hash(&self) -> Option<Fr> {
        match self {
            Node::Empty => Some(Fr::zero()),
            _ => self.commitment().map(|c| c.map_to_scalar_field()),
        }
    }

    /// The scalar a parent commits to for this node.
    ///
    /// # Panics
    ///
    /// Panics on an unresolved [`Node::Stub`].
    pub fn hash(&mut self) -> Fr {
        if self.is_stub() {
            panic!("cannot hash an unresolved node");
        }
        self.commit().map_to_scalar_field()
    }

    /// Collects the openings proving the values of the sorted `keys`.
    pub fn get_proof_items(
        &mut self,
        keys: &[Key],
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<ProofItems, TrieError> {
        self.proof_items(keys, resolver, None)
    }

    /// Like [`Node::get_proof_items`], also reporting leaves that are expired
    /// at `epoch`.
    pub fn get_proof_items_with_epoch(
        &mut self,
        keys: &[Key],
        resolver: Option<&dyn NodeResolver>,
        epoch: StateEpoch,
    ) -> Result<ProofItems, TrieError> {
        self.proof_items(keys, resolver, Some(epoch))
    }

    fn proof_items(
        &mut self,
        keys: &[Key],
        resolver: Option<&dyn NodeResolver>,
        epoch: Option<StateEpoch>,
    ) -> Result<ProofItems, TrieError> {
        match self {
            Node::Empty | Node::Expired(_) => Ok(ProofItems::default()),
            Node::Leaf(leaf) => Ok(leaf.proof_items(keys, epoch)),
            Node::Internal(internal) => {
                internal.proof_items(keys, resolver, epoch, MIN_PAR_BATCH_SIZE)
            }
            Node::Stub => Err(stub_proof_error(epoch.is_some())),
        }
    }

    /// Encodes the node for storage, committing first if needed.
    pub fn serialize(&mut self) -> Result<Vec<u8>, TrieError> {
        match self {
            Node::Empty => Err(TrieError::UnsupportedOperation {
                operation: "serialize an empty node",
            }),
            Node::Leaf(leaf) => Ok(leaf.serialize()),
            Node::Internal(internal) => Ok(internal.serialize()),
            Node::Stub => Err(TrieError::SerializeUnresolved),
            Node::Expired(expired) => Ok(expired.serialize()),
        }
    }

    /// Decodes a node produced by [`Node::serialize`] located at `depth`.
    pub fn parse(bytes: &[u8], depth: u8) -> Result<Node, TrieError> {
        match bytes.first() {
            Some(&INTERNAL_TYPE) => Ok(Node::Internal(Box::new(InternalNode::parse(bytes, depth)?))),
            Some(&LEAF_TYPE) => Ok(Node::Leaf(Box::new(LeafNode::parse(bytes, depth)?))),
            Some(&EXPIRED_TYPE) => Ok(Node::Expired(Box::new(ExpiredNode::parse(bytes)?))),
            Some(_) => Err(TrieError::InvalidNode {
                message: "unknown node type",
            }),
            None => Err(TrieError::InvalidNode {
                message: "empty node encoding",
            }),
        }
    }

    pub fn set_depth(&mut self, depth: u8) {
        match self {
            Node::Leaf(leaf) => leaf.set_depth(depth),
            Node::Internal(internal) => internal.set_depth(depth),
            Node::Empty | Node::Stub | Node::Expired(_) => {}
        }
    }

    /// Turns an expired leaf back into a live one. Only internal nodes can
    /// do this, since it replaces one of their children.
    pub fn revive(
        &mut self,
        key: &Key,
        values: &[(u8, Value)],
        epoch: StateEpoch,
        resolver: Option<&dyn NodeResolver>,
    ) -> Result<(), TrieError> {
        match self {
            Node::Internal(internal) => internal.revive(key, values, epoch, resolver),
            Node::Leaf(leaf) if *leaf.stem() == crate::types::stem_of(key) => {
                leaf.touch(epoch);
                Ok(())
            }
            _ => Err(TrieError::RevivalNotFound),
        }
    }

    /// Graphviz fragment for this subtree.
    pub fn to_dot(&self, parent: &str, path: &str) -> String {
        match self {
            Node::Empty => String::new(),
            Node::Leaf(leaf) => leaf.to_dot(parent, path),
            Node::Internal(internal) => internal.to_dot(parent, path),
            Node::Stub | Node::Expired(_) => unresolved_dot(parent, path),
        }
    }
}

/// Loads the node at `path` through the resolver.
pub(crate) fn resolve_node(resolver: &dyn NodeResolver, path: &[u8]) -> Result<Node, TrieError> {
    let bytes = resolver.resolve(path).map_err(TrieError::Resolver)?;
    debug!(path = %hex::encode(path), size = bytes.len(), "resolved node");
    let node = Node::parse(&bytes, path.len() as u8)?;
    let stem = match &node {
        Node::Leaf(leaf) => Some(leaf.stem()),
        Node::Expired(expired) => Some(expired.stem()),
        _ => None,
    };
    if stem.is_some_and(|stem| !stem.starts_with(path)) {
        return Err(TrieError::InvalidNode {
            message: "node stem does not extend its path",
        });
    }
    Ok(node)
}

pub(crate) fn set_bit(bitlist: &mut [u8], index: usize) {
    bitlist[index / 8] |= 0x80 >> (index % 8);
}

pub(crate) fn bit_is_set(bitlist: &[u8], index: usize) -> bool {
    bitlist[index / 8] & (0x80 >> (index % 8)) != 0
}

/// Compressed hex of a commitment for diagnostics.
pub(crate) fn point_hex(point: Option<Element>) -> String {
    point.map_or_else(|| "-".to_string(), |p| hex::encode(p.to_bytes()))
}
