//! The polynomial ring GF(2^128)[X].
//!
//! Coefficients are stored low degree first and every constructor trims
//! trailing zeros, so the representation is canonical: the zero polynomial is
//! the single coefficient `[0]` and any longer polynomial has a nonzero lead.

use crate::gf128::{FieldElement, PolyTag};
use crate::utils::Result;
use num_bigint::BigUint;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolyError {
    #[error("division by the zero polynomial")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfPoly {
    coeffs: Vec<FieldElement>,
    tag: PolyTag,
}

impl GfPoly {
    pub fn new(mut coeffs: Vec<FieldElement>, tag: PolyTag) -> Self {
        if coeffs.is_empty() {
            coeffs.push(FieldElement::zero(tag));
        }
        while coeffs.len() > 1 && coeffs[coeffs.len() - 1].is_zero() {
            coeffs.pop();
        }
        Self { coeffs, tag }
    }

    pub fn zero(tag: PolyTag) -> Self {
        Self::new(vec![], tag)
    }

    pub fn one(tag: PolyTag) -> Self {
        Self::new(vec![FieldElement::one(tag)], tag)
    }

    /// The indeterminate X.
    pub fn x(tag: PolyTag) -> Self {
        Self::new(vec![FieldElement::zero(tag), FieldElement::one(tag)], tag)
    }

    pub fn constant(c: FieldElement) -> Self {
        Self::new(vec![c], c.tag())
    }

    pub fn from_b64(coeffs: &[String], tag: PolyTag) -> Result<Self> {
        let elements = coeffs
            .iter()
            .map(|s| FieldElement::from_b64(s, tag))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(elements, tag))
    }

    pub fn to_b64(&self) -> Vec<String> {
        self.coeffs.iter().map(|c| c.to_b64()).collect()
    }

    pub fn coeffs(&self) -> &[FieldElement] {
        &self.coeffs
    }

    pub fn tag(&self) -> PolyTag {
        self.tag
    }

    /// Degree by representation length; the zero polynomial reports 0 and is
    /// special-cased where the distinction matters.
    pub fn deg(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs[0].is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs[0] == FieldElement::one(self.tag)
    }

    pub fn lead(&self) -> FieldElement {
        self.coeffs[self.coeffs.len() - 1]
    }

    pub fn add(&self, rhs: &Self) -> Self {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let zero = FieldElement::zero(self.tag);
        let coeffs = (0..n)
            .map(|i| {
                let a = self.coeffs.get(i).copied().unwrap_or(zero);
                let b = rhs.coeffs.get(i).copied().unwrap_or(zero);
                a + b
            })
            .collect();
        Self::new(coeffs, self.tag)
    }

    /// Schoolbook convolution.
    pub fn mul(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero(self.tag);
        }
        let mut coeffs = vec![FieldElement::zero(self.tag); self.deg() + rhs.deg() + 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] = coeffs[i + j] + a * b;
            }
        }
        Self::new(coeffs, self.tag)
    }

    /// Long division; returns (quotient, remainder) with deg R < deg B.
    pub fn divmod(&self, rhs: &Self) -> Result<(Self, Self), PolyError> {
        if rhs.is_zero() {
            return Err(PolyError::DivisionByZero);
        }
        Ok(self.divmod_nonzero(rhs))
    }

    pub fn rem(&self, rhs: &Self) -> Result<Self, PolyError> {
        self.divmod(rhs).map(|(_, r)| r)
    }

    fn divmod_nonzero(&self, rhs: &Self) -> (Self, Self) {
        let db = rhs.deg();
        let inv_lead = rhs
            .lead()
            .inv()
            .expect("leading coefficient of a nonzero polynomial is nonzero");
        let mut q = vec![FieldElement::zero(self.tag); self.deg().saturating_sub(db) + 1];
        let mut r = self.coeffs.clone();
        loop {
            while r.len() > 1 && r[r.len() - 1].is_zero() {
                r.pop();
            }
            if r.len() - 1 < db || (r.len() == 1 && r[0].is_zero()) {
                break;
            }
            let shift = (r.len() - 1) - db;
            let scale = r[r.len() - 1] * inv_lead;
            q[shift] = q[shift] + scale;
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                r[shift + j] = r[shift + j] + b * scale;
            }
        }
        (Self::new(q, self.tag), Self::new(r, self.tag))
    }

    /// Euclidean gcd; the result is monic, and gcd(0, 0) = 0.
    pub fn gcd(&self, rhs: &Self) -> Self {
        let (mut a, mut b) = (self.clone(), rhs.clone());
        while !b.is_zero() {
            let (_, r) = a.divmod_nonzero(&b);
            a = std::mem::replace(&mut b, r);
        }
        a.monic()
    }

    pub fn monic(&self) -> Self {
        if self.is_zero() {
            return Self::zero(self.tag);
        }
        let lead = self.lead();
        if lead == FieldElement::one(self.tag) {
            return self.clone();
        }
        let inv = lead
            .inv()
            .expect("leading coefficient of a nonzero polynomial is nonzero");
        Self::new(self.coeffs.iter().map(|&c| c * inv).collect(), self.tag)
    }

    /// Binary exponentiation; `pow(A, 0) = 1`.
    pub fn pow(&self, e: &BigUint) -> Self {
        let mut acc = Self::one(self.tag);
        let mut base = self.clone();
        let bits = e.bits();
        for i in 0..bits {
            if e.bit(i) {
                acc = acc.mul(&base);
            }
            if i + 1 < bits {
                base = base.mul(&base);
            }
        }
        acc
    }

    /// Binary exponentiation with a reduction after every step. The edge
    /// order matters: anything mod 1 is 0, A^0 is 1, and 0^e is 0 for e > 0.
    pub fn powmod(&self, e: &BigUint, m: &Self) -> Result<Self, PolyError> {
        use num_traits::Zero as _;
        if m.is_zero() {
            return Err(PolyError::DivisionByZero);
        }
        if m.is_one() {
            return Ok(Self::zero(self.tag));
        }
        if e.is_zero() {
            return Ok(Self::one(self.tag));
        }
        if self.is_zero() {
            return Ok(Self::zero(self.tag));
        }
        let (_, mut base) = self.divmod_nonzero(m);
        let mut acc = Self::one(self.tag);
        let bits = e.bits();
        for i in 0..bits {
            if e.bit(i) {
                acc = acc.mul(&base).divmod_nonzero(m).1;
            }
            if i + 1 < bits {
                base = base.mul(&base).divmod_nonzero(m).1;
            }
        }
        Ok(acc)
    }

    /// Formal derivative; in characteristic 2 only the odd-degree terms
    /// survive, with their coefficients unchanged.
    pub fn diff(&self) -> Self {
        if self.coeffs.len() <= 1 {
            return Self::zero(self.tag);
        }
        let coeffs = self.coeffs[1..]
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                // index i here is original degree i + 1
                if i % 2 == 0 {
                    c
                } else {
                    FieldElement::zero(self.tag)
                }
            })
            .collect();
        Self::new(coeffs, self.tag)
    }

    /// Square root of a polynomial whose odd-degree coefficients vanish:
    /// squaring maps X^i to X^(2i), so R_i = sqrt(c_(2i)).
    pub fn sqrt(&self) -> Self {
        let zero = FieldElement::zero(self.tag);
        let coeffs = (0..=self.deg() / 2)
            .map(|i| self.coeffs.get(2 * i).copied().unwrap_or(zero).sqrt())
            .collect();
        Self::new(coeffs, self.tag)
    }
}

/// Total order used by `gfpoly_sort` and the factor pipeline: by degree
/// first, ties broken on coefficient values from the top down; the zero
/// polynomial sorts below everything.
impl Ord for GfPoly {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        self.deg().cmp(&other.deg()).then_with(|| {
            for i in (0..=self.deg()).rev() {
                match self.coeffs[i].value().cmp(&other.coeffs[i].value()) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                }
            }
            Ordering::Equal
        })
    }
}

impl PartialOrd for GfPoly {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{One, Zero};

    const TAG: PolyTag = PolyTag::P1;

    fn fe(value: u128) -> FieldElement {
        FieldElement::new(value, TAG)
    }

    fn poly(values: &[u128]) -> GfPoly {
        GfPoly::new(values.iter().map(|&v| fe(v)).collect(), TAG)
    }

    #[test]
    fn construction_normalizes() {
        assert_eq!(poly(&[1, 2, 0, 0]), poly(&[1, 2]));
        assert_eq!(poly(&[0, 0]), GfPoly::zero(TAG));
        assert!(GfPoly::zero(TAG).is_zero());
        assert_eq!(GfPoly::zero(TAG).deg(), 0);
        assert_eq!(GfPoly::x(TAG).deg(), 1);
    }

    #[test]
    fn addition_is_coefficientwise_xor() {
        let a = poly(&[0b1100, 0b1010, 1]);
        let b = poly(&[0b1010, 0b1010, 1]);
        assert_eq!(a.add(&b), poly(&[0b0110]));
        assert_eq!(a.add(&GfPoly::zero(TAG)), a);
    }

    #[test]
    fn divmod_identity_holds() {
        let a = poly(&[0x1234, 5, 0xff00, 7, 0xdead]);
        let b = poly(&[3, 0x80, 9]);
        let (q, r) = a.divmod(&b).unwrap();
        assert!(r.is_zero() || r.deg() < b.deg());
        assert_eq!(q.mul(&b).add(&r), a);

        // dividing by a larger-degree polynomial leaves everything in the rest
        let (q, r) = b.divmod(&a).unwrap();
        assert!(q.is_zero());
        assert_eq!(r, b);

        assert_eq!(
            a.divmod(&GfPoly::zero(TAG)),
            Err(PolyError::DivisionByZero)
        );
    }

    #[test]
    fn gcd_pulls_out_the_common_factor() {
        // gcd((X+a)(X+c), (X+b)(X+c)) = X+c
        let xa = poly(&[5, 1]);
        let xb = poly(&[9, 1]);
        let xc = poly(&[0xabc, 1]);
        assert_eq!(xa.mul(&xc).gcd(&xb.mul(&xc)), xc);
        assert!(GfPoly::zero(TAG).gcd(&GfPoly::zero(TAG)).is_zero());
        // the gcd is monic even when the inputs are scaled
        let scaled = xc.mul(&GfPoly::constant(fe(0x77)));
        assert_eq!(scaled.gcd(&xc), xc);
    }

    #[test]
    fn monic_scales_by_the_inverse_lead() {
        let p = poly(&[6, 7, 0x123]);
        let m = p.monic();
        assert_eq!(m.lead(), FieldElement::one(TAG));
        // still the same polynomial up to the unit
        assert_eq!(m.mul(&GfPoly::constant(fe(0x123))), p);
        assert!(GfPoly::zero(TAG).monic().is_zero());
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let p = poly(&[1, 0xbeef, 3]);
        assert_eq!(p.pow(&BigUint::zero()), GfPoly::one(TAG));
        assert_eq!(p.pow(&BigUint::from(3u32)), p.mul(&p).mul(&p));
    }

    #[test]
    fn powmod_edges_and_consistency() {
        let p = poly(&[2, 1, 1]);
        let m = poly(&[7, 0, 0, 1]);
        assert_eq!(
            p.powmod(&BigUint::from(5u32), &m).unwrap(),
            p.pow(&BigUint::from(5u32)).rem(&m).unwrap()
        );
        assert!(p.powmod(&BigUint::from(5u32), &GfPoly::one(TAG)).unwrap().is_zero());
        assert!(p.powmod(&BigUint::zero(), &m).unwrap().is_one());
        assert!(GfPoly::zero(TAG)
            .powmod(&BigUint::from(5u32), &m)
            .unwrap()
            .is_zero());
        assert_eq!(
            p.powmod(&BigUint::one(), &GfPoly::zero(TAG)),
            Err(PolyError::DivisionByZero)
        );
    }

    #[test]
    fn derivative_keeps_odd_degrees() {
        let p = poly(&[0xa, 0xb, 0xc, 0xd]);
        assert_eq!(p.diff(), poly(&[0xb, 0, 0xd]));
        assert!(GfPoly::constant(fe(5)).diff().is_zero());
    }

    #[test]
    fn sqrt_inverts_squaring() {
        let r = poly(&[0x1111, 0x2222, 0x3333]);
        let square = r.mul(&r);
        // squaring in characteristic 2 leaves only even-degree terms
        assert!(square.coeffs().iter().skip(1).step_by(2).all(|c| c.is_zero()));
        assert_eq!(square.sqrt(), r);
    }

    #[test]
    fn ordering_is_degree_then_top_coefficients() {
        let zero = GfPoly::zero(TAG);
        let small = poly(&[0xff]);
        let linear_low = poly(&[9, 1]);
        let linear_high = poly(&[0, 2]);
        assert!(zero < small);
        assert!(small < linear_low);
        assert!(linear_low < linear_high);

        let mut polys = vec![linear_high.clone(), zero.clone(), linear_low.clone(), small.clone()];
        polys.sort();
        assert_eq!(polys, vec![zero, small, linear_low, linear_high]);
    }
}
