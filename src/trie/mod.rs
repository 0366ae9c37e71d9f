//! The trie engine: a root [`InternalNode`](crate::node::InternalNode) plus
//! the bookkeeping needed to operate on it (current epoch, parallelism
//! threshold, ordered bulk loading), and its stateless counterpart used to
//! replay proofs.

pub mod stateless;
#[allow(clippy::module_inception)]
pub mod trie;
