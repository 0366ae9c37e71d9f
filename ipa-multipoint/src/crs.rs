//! Common reference string for the Pedersen vector commitment.
//!
//! The generators are derived deterministically by hashing a public seed and
//! an index and keeping every digest that decodes to a banderwagon element,
//! so anyone can recompute them and nobody knows their discrete logs.

use crate::lagrange_basis::LagrangeBasis;
use banderwagon::{multi_scalar_mul, try_reduce_to_element, Element};

/// Common reference string.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct CRS {
    /// Capacity: the longest vector that can be committed to.
    pub n: usize,
    /// Value-binding generators.
    pub G: Vec<Element>,
    /// Blinding generator.
    pub Q: Element,
}

impl CRS {
    /// Derives `n` value generators plus the blinding generator from `seed`.
    #[allow(non_snake_case)]
    pub fn new(n: usize, seed: &[u8]) -> CRS {
        let all_points = generate_random_elements(n + 1, seed);
        CRS::assert_dedup(&all_points);

        let (G, q_slice) = all_points.split_at(n);
        CRS {
            n,
            G: G.to_vec(),
            Q: q_slice[0],
        }
    }

    /// Duplicate generators would break binding.
    fn assert_dedup(points: &[Element]) {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for point in points {
            assert!(seen.insert(point.to_bytes()), "crs has duplicated points");
        }
    }

    /// Commits to a polynomial in evaluation form with a plain MSM.
    ///
    /// Slow, but independent of any precomputed tables, which makes it the
    /// reference the table-based committer is checked against.
    pub fn commit_lagrange_poly(&self, polynomial: &LagrangeBasis) -> Element {
        let values = polynomial.values();
        multi_scalar_mul(&self.G[..values.len()], values)
    }
}

impl std::ops::Index<usize> for CRS {
    type Output = Element;

    fn index(&self, index: usize) -> &Self::Output {
        &self.G[index]
    }
}

/// Hash-to-curve over `sha256(seed || index_be)` for increasing indices.
fn generate_random_elements(num_required_points: usize, seed: &[u8]) -> Vec<Element> {
    use sha2::{Digest, Sha256};

    let hash_to_x = |index: u64| -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(index.to_be_bytes());
        hasher.finalize().to_vec()
    };

    (0u64..)
        .map(hash_to_x)
        .filter_map(|hash_bytes| try_reduce_to_element(&hash_bytes))
        .take(num_required_points)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use banderwagon::Fr;

    #[test]
    fn generation_is_deterministic() {
        let a = generate_random_elements(16, b"eth_verkle_oct_2021");
        let b = generate_random_elements(16, b"eth_verkle_oct_2021");
        assert_eq!(a, b);

        let other = generate_random_elements(16, b"another seed");
        assert_ne!(a[0], other[0]);
    }

    #[test]
    fn commit_is_linear() {
        let crs = CRS::new(4, b"eth_verkle_oct_2021");
        let poly = LagrangeBasis::new(vec![
            Fr::from(1u64),
            Fr::from(0u64),
            Fr::from(5u64),
            Fr::from(0u64),
        ]);
        let expected = crs[0] + crs[2] * Fr::from(5u64);
        assert_eq!(crs.commit_lagrange_poly(&poly), expected);
    }
}
