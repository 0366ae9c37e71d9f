use ark_ec::{twisted_edwards::TECurveConfig, PrimeGroup, ScalarMul, VariableBaseMSM};
use ark_ed_on_bls12_381_bandersnatch::{BandersnatchConfig, EdwardsAffine, EdwardsProjective, Fq};
use ark_ff::{batch_inversion, Field, One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

pub use ark_ed_on_bls12_381_bandersnatch::Fr;

/// A banderwagon group element.
///
/// Points `(x, y)` and `(-x, -y)` are the same element, which is why equality
/// and the compressed encoding both work on the ratio `x / y`.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Element(pub(crate) EdwardsProjective);

impl PartialEq for Element {
    /// `x1 / y1 == x2 / y2`, cross-multiplied to avoid the inversion.
    fn eq(&self, other: &Self) -> bool {
        (self.0.x * other.0.y) == (other.0.x * self.0.y)
    }
}

impl Element {
    /// Canonical 32-byte big-endian encoding, `sign(y) * x`.
    pub fn to_bytes(&self) -> [u8; 32] {
        let affine = EdwardsAffine::from(self.0);
        let x = if is_positive(affine.y) {
            affine.x
        } else {
            -affine.x
        };
        let mut bytes = [0u8; 32];
        x.serialize_compressed(&mut bytes[..])
            .expect("serialization failed");

        // arkworks is little endian
        bytes.reverse();
        bytes
    }

    /// Decodes the canonical encoding, rejecting points outside the subgroup.
    pub fn from_bytes(mut bytes: [u8; 32]) -> Option<Element> {
        bytes.reverse();

        let point = Self::get_point_from_x(Fq::deserialize_compressed(&bytes[..]).ok()?, true)?;
        if !subgroup_check(&point) {
            return None;
        }

        Some(Element(point))
    }

    /// 64-byte uncompressed encoding: affine `x` then `y`, little endian.
    ///
    /// Not canonical: `(x, y)` and `(-x, -y)` encode differently, so compare
    /// decoded elements rather than bytes.
    pub fn to_bytes_uncompressed(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        self.0
            .serialize_uncompressed(&mut bytes[..])
            .expect("cannot serialize point as an uncompressed byte array");
        bytes
    }

    /// Decodes an uncompressed point coming from an untrusted source.
    ///
    /// Returns `None` when the bytes are not coordinates of a curve point or
    /// the point is outside the banderwagon subgroup.
    pub fn from_bytes_uncompressed(bytes: [u8; 64]) -> Option<Element> {
        let affine = EdwardsAffine::deserialize_uncompressed_unchecked(&bytes[..]).ok()?;
        if !affine.is_on_curve() {
            return None;
        }
        let point = EdwardsProjective::from(affine);
        subgroup_check(&point).then_some(Element(point))
    }

    pub fn prime_subgroup_generator() -> Element {
        Element(EdwardsProjective::generator())
    }

    /// Solves `a*x^2 + y^2 = 1 + d*x^2*y^2` for `y`.
    fn get_point_from_x(x: Fq, choose_largest: bool) -> Option<EdwardsProjective> {
        let x_sq = x.square();
        let y_squared = (BandersnatchConfig::COEFF_A * x_sq - Fq::one())
            / (BandersnatchConfig::COEFF_D * x_sq - Fq::one());

        let y = y_squared.sqrt()?;
        let y = if is_positive(y) == choose_largest {
            y
        } else {
            -y
        };

        Some(EdwardsAffine::new_unchecked(x, y).into())
    }

    fn map_to_field(&self) -> Fq {
        self.0.x / self.0.y
    }

    /// Maps the element to a scalar through `x / y`. The identity maps to zero.
    ///
    /// This is the "hash" a parent commits to for each child.
    pub fn map_to_scalar_field(&self) -> Fr {
        let base_field = self.map_to_field();

        let mut bytes = [0u8; 32];
        base_field
            .serialize_compressed(&mut bytes[..])
            .expect("could not serialize point into a 32 byte array");
        Fr::from_le_bytes_mod_order(&bytes)
    }

    /// [`Element::map_to_scalar_field`] for many elements with one inversion.
    pub fn batch_map_to_scalar_field(elements: &[Element]) -> Vec<Fr> {
        let mut ys: Vec<Fq> = elements.iter().map(|element| element.0.y).collect();
        batch_inversion(&mut ys);

        ys.iter()
            .zip(elements)
            .map(|(y_inv, element)| {
                let mut bytes = [0u8; 32];
                (element.0.x * y_inv)
                    .serialize_compressed(&mut bytes[..])
                    .expect("could not serialize point into a 32 byte array");
                Fr::from_le_bytes_mod_order(&bytes)
            })
            .collect()
    }

    pub fn zero() -> Element {
        Element(EdwardsProjective::zero())
    }

    pub fn is_zero(&self) -> bool {
        *self == Element::zero()
    }
}

/// Interprets 32 bytes as a candidate x coordinate and returns the element
/// if one exists. Used to derive generators by hashing.
pub fn try_reduce_to_element(bytes: &[u8]) -> Option<Element> {
    let x = Fq::from_be_bytes_mod_order(bytes);

    let mut x_bytes = [0u8; 32];
    x.serialize_compressed(&mut x_bytes[..]).ok()?;
    x_bytes.reverse();

    Element::from_bytes(x_bytes)
}

// The lexicographically largest value is the positive one
fn is_positive(coordinate: Fq) -> bool {
    coordinate > -coordinate
}

/// `1 - a*x^2` must be a quadratic residue. Assumes the point is on the curve.
fn subgroup_check(point: &EdwardsProjective) -> bool {
    let affine = EdwardsAffine::from(*point);
    (Fq::one() - BandersnatchConfig::COEFF_A * affine.x.square())
        .legendre()
        .is_qr()
}

pub fn multi_scalar_mul(bases: &[Element], scalars: &[Fr]) -> Element {
    let bases_inner: Vec<_> = bases.iter().map(|element| element.0).collect();
    let bases = EdwardsProjective::batch_convert_to_mul_base(&bases_inner);

    let result = EdwardsProjective::msm(&bases, scalars)
        .expect("number of bases should equal number of scalars");

    Element(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_group_to_field() {
        let expected = "d1e7de2aaea9603d5bc6c208d319596376556ecd8336671ba7670c2139772d14";

        let generator = Element::prime_subgroup_generator();
        let mut bytes = [0u8; 32];
        generator
            .map_to_scalar_field()
            .serialize_compressed(&mut bytes[..])
            .unwrap();
        assert_eq!(hex::encode(bytes), expected);
    }

    #[test]
    fn identity_maps_to_zero_scalar() {
        assert_eq!(Element::zero().map_to_scalar_field(), Fr::zero());
    }

    #[test]
    fn uncompressed_roundtrip() {
        let point = Element::prime_subgroup_generator() * Fr::from(1234u64);
        let bytes = point.to_bytes_uncompressed();

        assert_eq!(Element::from_bytes_uncompressed(bytes), Some(point));
        assert_eq!(
            Element::from_bytes_uncompressed(Element::zero().to_bytes_uncompressed()),
            Some(Element::zero())
        );
    }

    #[test]
    fn uncompressed_rejects_garbage() {
        let mut bytes = Element::prime_subgroup_generator().to_bytes_uncompressed();
        bytes[3] ^= 0x55;
        assert_eq!(Element::from_bytes_uncompressed(bytes), None);
        assert_eq!(Element::from_bytes_uncompressed([0xff; 64]), None);
    }

    #[test]
    fn batch_map_matches_single() {
        let points: Vec<_> = (1..10u64)
            .map(|i| Element::prime_subgroup_generator() * Fr::from(i))
            .collect();

        let got = Element::batch_map_to_scalar_field(&points);
        for (point, scalar) in points.iter().zip(got) {
            assert_eq!(point.map_to_scalar_field(), scalar);
        }
    }

    #[test]
    fn compressed_is_sign_independent() {
        let point = EdwardsProjective::generator();
        let two_torsion =
            EdwardsProjective::new_unchecked(Fq::zero(), -Fq::one(), Fq::zero(), Fq::one());

        let element1 = Element(point);
        let element2 = Element(point + two_torsion);
        assert_eq!(element1.to_bytes(), element2.to_bytes());
        assert_eq!(element1, element2);

        let got = Element::from_bytes(element1.to_bytes()).expect("valid subgroup point");
        assert_eq!(got, element1);
    }

    #[test]
    fn reduce_finds_points() {
        let found = (0u8..32)
            .filter_map(|i| try_reduce_to_element(&[i; 32]))
            .count();
        assert!(found > 0);
    }
}
