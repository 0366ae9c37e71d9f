//! Inputs of a multi-point opening proof.
//!
//! Collecting proof items walks the trie for a sorted list of keys and
//! records, for every commitment on the way, the polynomial it commits to and
//! the evaluation point that binds the next level. The opening argument over
//! these items is produced elsewhere.

use crate::types::{Stem, Value};
use banderwagon::{Element, Fr};
use ipa_multipoint::lagrange_basis::LagrangeBasis;
use std::collections::BTreeMap;

/// Proof elements, extension statuses (one per distinct stem) and the stems
/// of leaves proving the absence of other stems.
pub type ProofItems = (ProofElements, Vec<ExtStatus>, Vec<Stem>);

/// Openings `f_i(z_i) = y_i` of commitments `C_i`, plus what a verifier
/// needs to rebuild the tree shape.
#[derive(Clone, Debug, Default)]
pub struct ProofElements {
    pub cis: Vec<Element>,
    pub zis: Vec<u8>,
    pub yis: Vec<Fr>,
    pub fis: Vec<LagrangeBasis>,
    /// Commitment of every node on the proven paths, keyed by node path.
    pub by_path: BTreeMap<Vec<u8>, Element>,
    /// Value of each proven key, in sorted key order.
    pub vals: Vec<Option<Value>>,
}

impl ProofElements {
    /// Adds the opening of `commitment` at domain point `z`.
    pub fn push_opening(&mut self, commitment: Element, z: u8, poly: LagrangeBasis) {
        self.cis.push(commitment);
        self.zis.push(z);
        self.yis.push(poly.evaluate_in_domain(z as usize));
        self.fis.push(poly);
    }

    pub fn merge(&mut self, other: ProofElements) {
        self.cis.extend(other.cis);
        self.zis.extend(other.zis);
        self.yis.extend(other.yis);
        self.fis.extend(other.fis);
        self.by_path.extend(other.by_path);
        self.vals.extend(other.vals);
    }

    pub fn num_openings(&self) -> usize {
        self.cis.len()
    }
}

/// Merges the items of a subtree into those of its parent.
pub(crate) fn merge_items(into: &mut ProofItems, other: ProofItems) {
    into.0.merge(other.0);
    into.1.extend(other.1);
    into.2.extend(other.2);
}

/// What the proof says about a stem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtPresence {
    /// The path ends in an empty slot.
    AbsentEmpty = 0,
    /// The path ends in a leaf of another stem.
    AbsentOther = 1,
    /// The leaf of this stem is present.
    Present = 2,
    /// The leaf of this stem was pruned and must be revived.
    Expired = 3,
}

impl TryFrom<u8> for ExtPresence {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExtPresence::AbsentEmpty),
            1 => Ok(ExtPresence::AbsentOther),
            2 => Ok(ExtPresence::Present),
            3 => Ok(ExtPresence::Expired),
            other => Err(other),
        }
    }
}

/// Presence in the low 3 bits, depth of the deciding node above them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExtStatus(pub u8);

impl ExtStatus {
    pub fn new(presence: ExtPresence, depth: u8) -> Self {
        debug_assert!(depth < 32, "depth {depth} does not fit an extension status");
        Self(presence as u8 | (depth << 3))
    }

    pub fn presence(&self) -> Option<ExtPresence> {
        ExtPresence::try_from(self.0 & 0b111).ok()
    }

    pub fn depth(&self) -> u8 {
        self.0 >> 3
    }
}
