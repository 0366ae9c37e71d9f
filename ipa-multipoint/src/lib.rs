//! Pedersen vector commitment setup shared by every verkle node.
//!
//! The opening argument itself lives outside this workspace; only the pieces
//! needed to produce commitments and opening inputs are kept here.

pub mod crs;
pub mod lagrange_basis;
