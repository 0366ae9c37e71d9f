//! Placeholders for subtrees that are not in memory.
//!
//! [`Node::Stub`](super::Node::Stub) marks a subtree that exists in the
//! backing store but was never loaded; it carries nothing and must be
//! resolved before use. [`ExpiredNode`] stands for a leaf that was pruned
//! after going untouched for too long. It keeps the stem, the commitment
//! and the last-touched epoch, so parents can still commit to it, but its
//! values are gone until it is revived.

use crate::{
    constant::*,
    epoch::{bytes_to_epoch, epoch_to_bytes, StateEpoch},
    types::{read_point, Stem, TrieError},
};
use banderwagon::Element;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiredNode {
    stem: Stem,
    commitment: Element,
    epoch: StateEpoch,
}

impl ExpiredNode {
    pub fn new(stem: Stem, commitment: Element, epoch: StateEpoch) -> Self {
        Self {
            stem,
            commitment,
            epoch,
        }
    }

    pub fn stem(&self) -> &Stem {
        &self.stem
    }

    /// Commitment of the pruned leaf.
    pub fn commitment(&self) -> Element {
        self.commitment
    }

    pub fn epoch(&self) -> StateEpoch {
        self.epoch
    }

    pub fn update_epoch(&mut self, epoch: StateEpoch) {
        self.epoch = epoch;
    }

    /// Epoch 0 predates expiry, so such a node carries no expiry information.
    pub fn enable_expiry(&self) -> bool {
        *self.epoch != 0
    }

    /// `[type][stem][commitment][epoch]`
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EXPIRED_NODE_SIZE);
        bytes.push(EXPIRED_TYPE);
        bytes.extend_from_slice(&self.stem);
        bytes.extend_from_slice(&self.commitment.to_bytes_uncompressed());
        bytes.extend_from_slice(&epoch_to_bytes(self.epoch));
        bytes
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, TrieError> {
        if bytes.len() != EXPIRED_NODE_SIZE || bytes[0] != EXPIRED_TYPE {
            return Err(TrieError::InvalidNode {
                message: "expired node must be 98 bytes",
            });
        }
        let stem: Stem = bytes[EXPIRED_STEM_OFFSET..EXPIRED_COMMITMENT_OFFSET]
            .try_into()
            .map_err(|_| TrieError::InvalidNode { message: "bad stem" })?;

        Ok(Self {
            stem,
            commitment: read_point(&bytes[EXPIRED_COMMITMENT_OFFSET..EXPIRED_EPOCH_OFFSET])?,
            epoch: bytes_to_epoch(&bytes[EXPIRED_EPOCH_OFFSET..]),
        })
    }
}

/// Graphviz fragment shared by both placeholders.
pub(crate) fn unresolved_dot(parent: &str, path: &str) -> String {
    format!("hash{path} [label=\"unresolved\"]\n{parent} -> hash{path}\n")
}

/// Error for a proof request that reached an unresolved stub. The
/// epoch-aware collection reports the subtree as an empty commitment.
pub(crate) fn stub_proof_error(with_epoch: bool) -> TrieError {
    if with_epoch {
        TrieError::EmptySubtreeCommitment
    } else {
        TrieError::NoProofForUnresolvedSubtree
    }
}
