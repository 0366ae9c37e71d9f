//! Constants that determine the shape of the verkle trie and its node encodings.
use banderwagon::Committer;
use ipa_multipoint::crs::CRS;
use once_cell::sync::Lazy;

/// Number of bits consumed from the key at each internal level.
pub const NODE_WIDTH_BITS: usize = 8;
/// Branch factor of internal nodes, also the number of value slots of a leaf.
pub const NODE_WIDTH: usize = 1 << NODE_WIDTH_BITS;
/// Length of a full key.
pub const KEY_SIZE: usize = 32;
/// Length of a stem: the key minus its final suffix byte.
pub const STEM_SIZE: usize = KEY_SIZE - 1;
/// Length of a stored value.
pub const VALUE_SIZE: usize = 32;
/// Length of an encoded [`StateEpoch`](crate::StateEpoch).
pub const EPOCH_SIZE: usize = 2;
/// Length of an uncompressed banderwagon point.
pub const UNCOMPRESSED_POINT_SIZE: usize = 64;
/// Length of the type discriminant heading every encoded node.
pub const NODE_TYPE_SIZE: usize = 1;
/// Length of the child/value presence bitlist.
pub const BITLIST_SIZE: usize = NODE_WIDTH / 8;

pub const INTERNAL_TYPE: u8 = 1;
pub const LEAF_TYPE: u8 = 2;
pub const EXPIRED_TYPE: u8 = 3;

// Internal: [type][bitlist][commitment]
pub const INTERNAL_BITLIST_OFFSET: usize = NODE_TYPE_SIZE;
pub const INTERNAL_COMMITMENT_OFFSET: usize = INTERNAL_BITLIST_OFFSET + BITLIST_SIZE;
pub const INTERNAL_NODE_SIZE: usize = INTERNAL_COMMITMENT_OFFSET + UNCOMPRESSED_POINT_SIZE;

// Leaf: [type][stem][bitlist][C][C1][C2][epoch][values...]
pub const LEAF_STEM_OFFSET: usize = NODE_TYPE_SIZE;
pub const LEAF_BITLIST_OFFSET: usize = LEAF_STEM_OFFSET + STEM_SIZE;
pub const LEAF_COMMITMENT_OFFSET: usize = LEAF_BITLIST_OFFSET + BITLIST_SIZE;
pub const LEAF_C1_OFFSET: usize = LEAF_COMMITMENT_OFFSET + UNCOMPRESSED_POINT_SIZE;
pub const LEAF_C2_OFFSET: usize = LEAF_C1_OFFSET + UNCOMPRESSED_POINT_SIZE;
pub const LEAF_EPOCH_OFFSET: usize = LEAF_C2_OFFSET + UNCOMPRESSED_POINT_SIZE;
pub const LEAF_VALUES_OFFSET: usize = LEAF_EPOCH_OFFSET + EPOCH_SIZE;

// Expired: [type][stem][commitment][epoch]
pub const EXPIRED_STEM_OFFSET: usize = NODE_TYPE_SIZE;
pub const EXPIRED_COMMITMENT_OFFSET: usize = EXPIRED_STEM_OFFSET + STEM_SIZE;
pub const EXPIRED_EPOCH_OFFSET: usize = EXPIRED_COMMITMENT_OFFSET + UNCOMPRESSED_POINT_SIZE;
pub const EXPIRED_NODE_SIZE: usize = EXPIRED_EPOCH_OFFSET + EPOCH_SIZE;

/// Don't recommit dirty children in parallel below this many.
pub const MIN_PAR_BATCH_SIZE: usize = 16;

/// Window size of the precomputed committer tables. Each extra bit roughly
/// doubles the table memory and saves one point addition per window.
pub const PRECOMP_WINDOW_SIZE: usize = 6;

/// Seed the CRS generators are hashed from.
pub const CRS_SEED: &[u8] = b"eth_verkle_oct_2021";

static CRS_INSTANCE: Lazy<CRS> = Lazy::new(|| CRS::new(NODE_WIDTH, CRS_SEED));

static COMMITTER: Lazy<Committer> =
    Lazy::new(|| Committer::new(&CRS_INSTANCE.G, PRECOMP_WINDOW_SIZE));

/// The CRS shared by every node commitment.
pub fn crs() -> &'static CRS {
    &CRS_INSTANCE
}

/// Table-based committer over the [`crs`] generators, built on first use.
pub fn committer() -> &'static Committer {
    &COMMITTER
}
