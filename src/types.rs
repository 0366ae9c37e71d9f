//! Core data types of the verkle trie.
//!
//! - [`Key`], [`Stem`] and [`Value`]: fixed-size byte strings addressing and
//!   holding state
//! - [`TrieError`]: every recoverable failure, classified by [`ErrorKind`]

use crate::{
    constant::{KEY_SIZE, STEM_SIZE, UNCOMPRESSED_POINT_SIZE, VALUE_SIZE},
    epoch::StateEpoch,
    traits::ResolverError,
};
use banderwagon::Element;
use thiserror::Error;

/// Full 32-byte key: stem followed by the suffix byte.
pub type Key = [u8; KEY_SIZE];

/// The first 31 key bytes, shared by all values of one leaf.
pub type Stem = [u8; STEM_SIZE];

/// Opaque 32-byte value.
pub type Value = [u8; VALUE_SIZE];

/// 64-byte uncompressed group element.
pub type CommitmentBytes = [u8; UNCOMPRESSED_POINT_SIZE];

/// Splits the stem off a key.
pub fn stem_of(key: &Key) -> Stem {
    let mut stem = [0u8; STEM_SIZE];
    stem.copy_from_slice(&key[..STEM_SIZE]);
    stem
}

/// Last key byte, selecting a value slot within the leaf.
pub fn suffix_of(key: &Key) -> u8 {
    key[STEM_SIZE]
}

/// Inverse of [`stem_of`] and [`suffix_of`].
pub fn key_from_stem(stem: &Stem, suffix: u8) -> Key {
    let mut key = [0u8; KEY_SIZE];
    key[..STEM_SIZE].copy_from_slice(stem);
    key[STEM_SIZE] = suffix;
    key
}

/// Decodes a commitment read from an untrusted encoding.
pub(crate) fn read_point(bytes: &[u8]) -> Result<Element, TrieError> {
    let bytes: CommitmentBytes = bytes.try_into().map_err(|_| TrieError::InvalidNode {
        message: "commitment must be 64 bytes",
    })?;
    Element::from_bytes_uncompressed(bytes).ok_or(TrieError::InvalidNode {
        message: "commitment is not a banderwagon element",
    })
}

/// Errors returned by trie and node operations.
///
/// Calling `commit` or `hash` on an unresolved stub is not part of this
/// enum: it is a broken invariant and panics.
#[derive(Error, Debug)]
pub enum TrieError {
    #[error("cannot insert into an unresolved node")]
    InsertIntoStub,

    #[error("cannot delete from an unresolved node in place")]
    DeleteFromStub,

    #[error("cannot read from an unresolved node")]
    ReadFromStub,

    #[error("cannot serialize an unresolved node")]
    SerializeUnresolved,

    #[error("key does not belong to this leaf's stem")]
    InsertIntoOtherStem,

    #[error("cannot insert into an empty node in place")]
    InsertIntoEmpty,

    #[error("cannot collect proof items for an unresolved subtree")]
    NoProofForUnresolvedSubtree,

    #[error("trying to produce a commitment for an empty subtree")]
    EmptySubtreeCommitment,

    #[error("no expired node matches the revival data")]
    RevivalNotFound,

    #[error("operation '{operation}' not supported")]
    UnsupportedOperation { operation: &'static str },

    #[error("resolver failed: {0}")]
    Resolver(#[source] ResolverError),

    #[error("invalid serialized node: {message}")]
    InvalidNode { message: &'static str },

    #[error("stem 0x{} expired at epoch {epoch}", hex::encode(.stem))]
    Expired { stem: Stem, epoch: StateEpoch },

    #[error("keys must be inserted in non-decreasing order")]
    UnorderedInsert,
}

/// Coarse classification of [`TrieError`] for callers deciding how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A read, write or serialize reached an unresolved placeholder.
    StubViolation,
    /// Proof items cannot be produced for the requested subtree.
    ProofUnavailable,
    /// Revival data does not match any expired node.
    RevivalNotFound,
    /// Rejected by the stateless trie.
    UnsupportedOperation,
    /// The resolver failed.
    ResolverFailure,
    /// Bytes handed to the trie do not decode.
    Malformed,
    /// The addressed leaf is expired and must be revived first.
    Expired,
    /// The caller broke an API precondition.
    Misuse,
}

impl TrieError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrieError::InsertIntoStub
            | TrieError::DeleteFromStub
            | TrieError::ReadFromStub
            | TrieError::SerializeUnresolved => ErrorKind::StubViolation,
            TrieError::NoProofForUnresolvedSubtree | TrieError::EmptySubtreeCommitment => {
                ErrorKind::ProofUnavailable
            }
            TrieError::RevivalNotFound => ErrorKind::RevivalNotFound,
            TrieError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            TrieError::Resolver(_) => ErrorKind::ResolverFailure,
            TrieError::InvalidNode { .. } => ErrorKind::Malformed,
            TrieError::Expired { .. } => ErrorKind::Expired,
            TrieError::InsertIntoOtherStem
            | TrieError::InsertIntoEmpty
            | TrieError::UnorderedInsert => ErrorKind::Misuse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_split_roundtrip() {
        let mut key = [0u8; KEY_SIZE];
        key[0] = 0xaa;
        key[30] = 0xbb;
        key[31] = 0xcc;

        let stem = stem_of(&key);
        assert_eq!(stem[0], 0xaa);
        assert_eq!(stem[30], 0xbb);
        assert_eq!(suffix_of(&key), 0xcc);
        assert_eq!(key_from_stem(&stem, 0xcc), key);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(TrieError::ReadFromStub.kind(), ErrorKind::StubViolation);
        assert_eq!(TrieError::EmptySubtreeCommitment.kind(), ErrorKind::ProofUnavailable);
        assert_eq!(
            TrieError::NoProofForUnresolvedSubtree.kind(),
            ErrorKind::ProofUnavailable
        );
        assert_eq!(
            TrieError::UnsupportedOperation { operation: "insert_ordered" }.kind(),
            ErrorKind::UnsupportedOperation
        );
        assert_eq!(
            TrieError::Resolver("store offline".into()).kind(),
            ErrorKind::ResolverFailure
        );
        assert_eq!(TrieError::UnorderedInsert.kind(), ErrorKind::Misuse);
    }

    #[test]
    fn messages() {
        let err = TrieError::Expired {
            stem: [0x01; STEM_SIZE],
            epoch: StateEpoch(7),
        };
        assert_eq!(err.to_string(), format!("stem 0x{} expired at epoch 7", "01".repeat(31)));

        let err = TrieError::Resolver("store offline".into());
        assert_eq!(err.to_string(), "resolver failed: store offline");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn rejects_bad_points() {
        assert!(matches!(read_point(&[0u8; 12]), Err(TrieError::InvalidNode { .. })));
        assert!(matches!(read_point(&[0xff; 64]), Err(TrieError::InvalidNode { .. })));
        let identity = Element::zero().to_bytes_uncompressed();
        assert!(read_point(&identity).unwrap().is_zero());
    }
}
