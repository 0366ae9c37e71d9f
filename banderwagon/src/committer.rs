//! Fixed-base multi-scalar multiplication with precomputed window tables.

use crate::element::Element;
use ark_ec::CurveGroup;
use ark_ed_on_bls12_381_bandersnatch::{EdwardsAffine, EdwardsProjective, Fr};
use ark_ff::{AdditiveGroup, PrimeField, Zero};
use rayon::prelude::*;

/// Number of scalar bits covered by the windows.
const SCALAR_BITS: usize = 256;

/// Commits to vectors over a fixed list of generators `G`.
///
/// For every generator the table holds `k * 2^(w*j) * G[i]` for each window
/// `j` and `k` in `0..=2^(w-1)`. Digits above half a window are applied as a
/// negated point with a carry into the next window, which halves the table.
#[derive(Clone, Debug)]
pub struct Committer {
    /// Window size in bits.
    window_size: usize,
    /// One table per generator, `windows * (half + 1)` affine points each.
    tables: Vec<Vec<EdwardsAffine>>,
}

impl Committer {
    pub fn new(bases: &[Element], window_size: usize) -> Committer {
        assert!(
            (2..=16).contains(&window_size),
            "window size {window_size} out of range"
        );
        let num_windows = SCALAR_BITS.div_ceil(window_size);
        let half = 1usize << (window_size - 1);

        let tables = bases
            .par_iter()
            .map(|base| {
                let mut table = Vec::with_capacity(num_windows * (half + 1));
                let mut window_base = base.0;
                for _ in 0..num_windows {
                    let mut multiple = EdwardsProjective::zero();
                    for _ in 0..=half {
                        table.push(multiple);
                        multiple += window_base;
                    }
                    for _ in 0..window_size {
                        window_base.double_in_place();
                    }
                }
                EdwardsProjective::normalize_batch(&table)
            })
            .collect();

        Committer {
            window_size,
            tables,
        }
    }

    /// Number of generators this committer was built for.
    pub fn num_bases(&self) -> usize {
        self.tables.len()
    }

    /// Returns `scalar * G[g_i]`.
    pub fn mul_index(&self, scalar: &Fr, g_i: usize) -> Element {
        let half = 1usize << (self.window_size - 1);
        let full = 1usize << self.window_size;
        let table = &self.tables[g_i];

        let mut result = EdwardsProjective::zero();
        let mut carry = 0;
        for (window, digit) in window_digits(scalar, self.window_size)
            .into_iter()
            .enumerate()
        {
            let digit = digit as usize + carry;
            let offset = window * (half + 1);
            if digit > half {
                // digit - 2^w is negative, borrow one from the next window
                result += -table[offset + full - digit];
                carry = 1;
            } else {
                if digit != 0 {
                    result += table[offset + digit];
                }
                carry = 0;
            }
        }
        debug_assert_eq!(carry, 0, "scalar overflowed the last window");

        Element(result)
    }

    /// Returns `(new - old) * G[g_i]`, the change a slot update makes to a
    /// commitment.
    pub fn gi_mul_delta(&self, old: &Fr, new: &Fr, g_i: usize) -> Element {
        self.mul_index(&(*new - *old), g_i)
    }

    /// Commits to a sparse vector given as `(index, value)` pairs.
    pub fn commit_sparse(&self, terms: &[(usize, Fr)]) -> Element {
        terms
            .par_iter()
            .filter(|(_, scalar)| !scalar.is_zero())
            .map(|(index, scalar)| self.mul_index(scalar, *index))
            .reduce(Element::zero, |a, b| a + b)
    }

    /// Commits to a dense vector in evaluation form.
    pub fn commit_lagrange(&self, values: &[Fr]) -> Element {
        assert!(
            values.len() <= self.num_bases(),
            "vector of length {} exceeds {} generators",
            values.len(),
            self.num_bases()
        );
        let terms: Vec<_> = values.iter().copied().enumerate().collect();
        self.commit_sparse(&terms)
    }
}

/// Splits the scalar into `w`-bit digits, least significant first.
#[inline]
fn window_digits(scalar: &Fr, w: usize) -> Vec<u64> {
    let limbs = scalar.into_bigint().0;
    let mask = (1u64 << w) - 1;

    (0..64 * limbs.len())
        .step_by(w)
        .map(|start_bit| {
            let limb = start_bit >> 6;
            let offset = start_bit & 63;

            let mut digit = (limbs[limb] >> offset) & mask;
            if offset + w > 64 && limb < limbs.len() - 1 {
                let taken = 64 - offset;
                digit |= (limbs[limb + 1] << taken) & mask;
            }
            digit
        })
        .collect()
}
