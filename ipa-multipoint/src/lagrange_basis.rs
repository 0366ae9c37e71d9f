//! Polynomials in evaluation form over the domain `0..n`.
use banderwagon::Fr;
use std::ops::{Add, Mul, Sub};

/// A polynomial given by its evaluations at `0, 1, ..., n - 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LagrangeBasis {
    values: Vec<Fr>,
}

impl LagrangeBasis {
    pub fn new(values: Vec<Fr>) -> Self {
        Self { values }
    }

    /// The all-zero polynomial over a domain of `domain_size` points.
    pub fn zero(domain_size: usize) -> Self {
        Self {
            values: vec![Fr::from(0u64); domain_size],
        }
    }

    pub fn values(&self) -> &[Fr] {
        &self.values
    }

    pub fn domain_size(&self) -> usize {
        self.values.len()
    }

    /// Evaluation at domain point `point`.
    ///
    /// # Panics
    ///
    /// Panics if `point` is outside the domain.
    pub fn evaluate_in_domain(&self, point: usize) -> Fr {
        self.values[point]
    }
}

impl From<Vec<Fr>> for LagrangeBasis {
    fn from(values: Vec<Fr>) -> Self {
        Self::new(values)
    }
}

impl Add for LagrangeBasis {
    type Output = LagrangeBasis;

    fn add(mut self, rhs: Self) -> Self::Output {
        assert_eq!(self.domain_size(), rhs.domain_size(), "domain size mismatch");
        self.values
            .iter_mut()
            .zip(rhs.values)
            .for_each(|(lhs, rhs)| *lhs += rhs);
        self
    }
}

impl Sub for LagrangeBasis {
    type Output = LagrangeBasis;

    fn sub(mut self, rhs: Self) -> Self::Output {
        assert_eq!(self.domain_size(), rhs.domain_size(), "domain size mismatch");
        self.values
            .iter_mut()
            .zip(rhs.values)
            .for_each(|(lhs, rhs)| *lhs -= rhs);
        self
    }
}

impl Mul<Fr> for LagrangeBasis {
    type Output = LagrangeBasis;

    fn mul(mut self, rhs: Fr) -> Self::Output {
        self.values.iter_mut().for_each(|value| *value *= rhs);
        self
    }
}
