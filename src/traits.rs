//! Traits connecting the trie to the stores its unloaded subtrees live in.
use std::error::Error;

/// Error returned by a [`NodeResolver`]; propagated to the caller unchanged.
pub type ResolverError = Box<dyn Error + Send + Sync>;

/// Loads serialized nodes for subtrees that are not in memory.
///
/// Traversals call the resolver whenever they need to look past a stub. The
/// `path` is the key prefix leading to the requested node (empty for the
/// root) and the result must be a single node encoded as in
/// [`Node::serialize`](crate::node::Node::serialize).
///
/// Any `Fn(&[u8]) -> Result<Vec<u8>, ResolverError>` closure is a resolver.
pub trait NodeResolver {
    fn resolve(&self, path: &[u8]) -> Result<Vec<u8>, ResolverError>;
}

impl<F> NodeResolver for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, ResolverError>,
{
    fn resolve(&self, path: &[u8]) -> Result<Vec<u8>, ResolverError> {
        self(path)
    }
}
