//! The banderwagon group: a prime-order quotient of the Bandersnatch curve.
//!
//! This crate is the group arithmetic backend of the verkle trie. It exposes
//! the [`Element`] type, the scalar field [`Fr`], point encodings, the
//! point-to-scalar map used to chain commitments, and a [`Committer`] that
//! multiplies the fixed CRS generators with precomputed tables.

pub mod committer;
mod element;
mod trait_impls;

pub use committer::Committer;
pub use element::{multi_scalar_mul, try_reduce_to_element, Element, Fr};

pub use ark_ff::{Field, PrimeField};
pub use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

/// Re-exports of the arkworks traits callers need to do arithmetic on [`Fr`].
pub mod trait_defs {
    pub use ark_ff::{batch_inversion, AdditiveGroup, Field, One, PrimeField, Zero};
    pub use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
}
