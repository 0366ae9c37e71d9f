//! Group operators for [`Element`].
//!
//! ```
//! # use banderwagon::{Element, Fr};
//! let p = Element::prime_subgroup_generator();
//! let sum = p + p;
//! assert_eq!(sum, p * Fr::from(2u64));
//! assert_eq!(sum - p, p);
//! let total: Element = vec![p, -p].into_iter().sum();
//! assert!(total.is_zero());
//! ```
use crate::{Element, Fr};

use std::{
    hash::Hash,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

impl Mul<Fr> for Element {
    type Output = Element;

    fn mul(self, rhs: Fr) -> Self::Output {
        Element(self.0.mul(rhs))
    }
}

impl Mul<&Fr> for &Element {
    type Output = Element;

    fn mul(self, rhs: &Fr) -> Self::Output {
        Element(self.0.mul(rhs))
    }
}

impl Add<Element> for Element {
    type Output = Element;

    fn add(self, rhs: Element) -> Self::Output {
        Element(self.0 + rhs.0)
    }
}

impl AddAssign<Element> for Element {
    fn add_assign(&mut self, rhs: Element) {
        self.0 += rhs.0
    }
}

impl Sub<Element> for Element {
    type Output = Element;

    fn sub(self, rhs: Element) -> Self::Output {
        Element(self.0 - rhs.0)
    }
}

impl SubAssign<Element> for Element {
    fn sub_assign(&mut self, rhs: Element) {
        self.0 -= rhs.0
    }
}

impl Neg for Element {
    type Output = Element;

    fn neg(self) -> Self::Output {
        Element(-self.0)
    }
}

/// The empty sum is the identity.
impl Sum for Element {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Element(iter.map(|element| element.0).sum())
    }
}

/// Hashes the canonical encoding, so equal elements hash equally.
impl Hash for Element {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state)
    }
}
