//! GF(2^128) arithmetic in the bit convention AES-GCM uses.
//!
//! Externally a field element is a 16-byte block where the leftmost bit of
//! byte 0 is the coefficient of x^0. Internally we keep a `u128` with bit i
//! holding the coefficient of x^i, so the codec between the two is a
//! big-endian read followed by a full 128-bit reversal (equivalently: reverse
//! the byte order, then the bits inside each byte). Two reduction polynomials
//! are supported; `P1` is the GHASH standard x^128 + x^7 + x^2 + x + 1.

use crate::utils::{b64_encode, decode_block, Result, BLOCK_SIZE};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::Deserialize;
use std::ops::{Add, Mul};
use thiserror::Error;

/// Per-byte bit reversal table for the block codec.
const REV8: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut byte = i as u8;
        let mut reversed = 0u8;
        let mut bit = 0;
        while bit < 8 {
            reversed = (reversed << 1) | (byte & 1);
            byte >>= 1;
            bit += 1;
        }
        table[i] = reversed;
        i += 1;
    }
    table
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolyTag {
    P1,
    P2,
}

impl PolyTag {
    /// The reduction polynomial without its x^128 term.
    pub fn low_terms(self) -> u128 {
        match self {
            PolyTag::P1 => (1 << 7) | (1 << 2) | (1 << 1) | 1,
            PolyTag::P2 => (1 << 98) | (1 << 69) | (1 << 33) | 1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("zero has no multiplicative inverse")]
    ZeroInverse,
    #[error("division by zero")]
    DivisionByZero,
}

pub fn block_to_value(block: &[u8; BLOCK_SIZE]) -> u128 {
    u128::from_le_bytes(block.map(|b| REV8[b as usize]))
}

pub fn value_to_block(value: u128) -> [u8; BLOCK_SIZE] {
    value.to_le_bytes().map(|b| REV8[b as usize])
}

/// An element of GF(2^128) tagged with its reduction polynomial.
///
/// Both operands of any arithmetic must carry the same tag; every action
/// decodes all of its elements under a single tag, so a mismatch is a
/// programming error and asserted rather than surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldElement {
    value: u128,
    tag: PolyTag,
}

impl FieldElement {
    pub fn new(value: u128, tag: PolyTag) -> Self {
        Self { value, tag }
    }

    pub fn zero(tag: PolyTag) -> Self {
        Self::new(0, tag)
    }

    pub fn one(tag: PolyTag) -> Self {
        Self::new(1, tag)
    }

    pub fn from_block(block: &[u8; BLOCK_SIZE], tag: PolyTag) -> Self {
        Self::new(block_to_value(block), tag)
    }

    pub fn to_block(self) -> [u8; BLOCK_SIZE] {
        value_to_block(self.value)
    }

    pub fn from_b64(input: &str, tag: PolyTag) -> Result<Self> {
        Ok(Self::from_block(&decode_block(input)?, tag))
    }

    pub fn to_b64(self) -> String {
        b64_encode(&self.to_block())
    }

    pub fn value(self) -> u128 {
        self.value
    }

    pub fn tag(self) -> PolyTag {
        self.tag
    }

    pub fn is_zero(self) -> bool {
        self.value == 0
    }

    /// Multiplicative inverse via the extended Euclidean algorithm in
    /// GF(2)[x], run against the full 129-bit reduction polynomial.
    pub fn inv(self) -> Result<Self, FieldError> {
        if self.value == 0 {
            return Err(FieldError::ZeroInverse);
        }
        let modulus = (BigUint::one() << 128u32) | BigUint::from(self.tag.low_terms());
        let (mut r0, mut r1) = (modulus, BigUint::from(self.value));
        // Track only the coefficient of `self.value`; the gcd ends at 1
        // because the modulus is irreducible.
        let (mut t0, mut t1) = (BigUint::zero(), BigUint::one());
        while !r1.is_zero() {
            let (q, r) = gf2::divmod(&r0, &r1);
            let t = &t0 ^ gf2::mul(&q, &t1);
            r0 = std::mem::replace(&mut r1, r);
            t0 = std::mem::replace(&mut t1, t);
        }
        Ok(Self::new(low_128(&t0), self.tag))
    }

    pub fn div(self, rhs: Self) -> Result<Self, FieldError> {
        match rhs.inv() {
            Ok(inverse) => Ok(self * inverse),
            Err(_) => Err(FieldError::DivisionByZero),
        }
    }

    /// Square-and-multiply; `pow(a, 0) = 1`.
    pub fn pow(self, e: &BigUint) -> Self {
        let mut acc = Self::one(self.tag);
        let mut base = self;
        let bits = e.bits();
        for i in 0..bits {
            if e.bit(i) {
                acc = acc * base;
            }
            if i + 1 < bits {
                base = base * base;
            }
        }
        acc
    }

    /// Squaring is the Frobenius map, so the square root is the 127-fold
    /// square: a^(2^127).
    pub fn sqrt(self) -> Self {
        self.pow(&(BigUint::one() << 127u32))
    }
}

impl Add for FieldElement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        assert_eq!(self.tag, rhs.tag, "reduction polynomials must match");
        Self::new(self.value ^ rhs.value, self.tag)
    }
}

impl Mul for FieldElement {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        assert_eq!(self.tag, rhs.tag, "reduction polynomials must match");
        let (hi, lo) = clmul(self.value, rhs.value);
        Self::new(reduce(hi, lo, self.tag.low_terms()), self.tag)
    }
}

/// 256-bit carryless product as a (high, low) pair of 128-bit halves.
fn clmul(a: u128, b: u128) -> (u128, u128) {
    let mut hi = 0u128;
    let mut lo = 0u128;
    for i in 0..128 {
        if a >> i & 1 == 1 {
            lo ^= b << i;
            if i > 0 {
                hi ^= b >> (128 - i);
            }
        }
    }
    (hi, lo)
}

/// Folds every term above x^127 down through the reduction polynomial,
/// highest first. A fold of x^(128+h) contributes `low_terms << h`, whose own
/// overflow is pushed back into the high half at a strictly lower position.
fn reduce(mut hi: u128, mut lo: u128, low_terms: u128) -> u128 {
    while hi != 0 {
        let h = 127 - hi.leading_zeros();
        hi ^= 1u128 << h;
        lo ^= low_terms << h;
        if h > 0 {
            hi ^= low_terms >> (128 - h);
        }
    }
    lo
}

/// GF(2)[x] long division on the bit-reflected block representation, with no
/// field reduction. This is the semantic of the `gf_divmod` action.
pub fn raw_divmod(
    a: &[u8; BLOCK_SIZE],
    b: &[u8; BLOCK_SIZE],
) -> Result<([u8; BLOCK_SIZE], [u8; BLOCK_SIZE]), FieldError> {
    let divisor = block_to_value(b);
    if divisor == 0 {
        return Err(FieldError::DivisionByZero);
    }
    let (q, r) = gf2::divmod(
        &BigUint::from(block_to_value(a)),
        &BigUint::from(divisor),
    );
    Ok((value_to_block(low_128(&q)), value_to_block(low_128(&r))))
}

fn low_128(x: &BigUint) -> u128 {
    x.iter_u64_digits()
        .take(2)
        .enumerate()
        .fold(0u128, |acc, (i, digit)| acc | (u128::from(digit) << (64 * i)))
}

/// Polynomials over GF(2) packed into big integers, bit i = x^i. Shared by
/// field inversion and the raw `gf_divmod` action.
pub(crate) mod gf2 {
    use num_bigint::BigUint;
    use num_traits::Zero;

    /// Long division; `b` must be nonzero.
    pub fn divmod(a: &BigUint, b: &BigUint) -> (BigUint, BigUint) {
        let db = b.bits();
        let mut q = BigUint::zero();
        let mut r = a.clone();
        while r.bits() >= db && !r.is_zero() {
            let shift = r.bits() - db;
            q.set_bit(shift, true);
            r ^= b << shift;
        }
        (q, r)
    }

    /// Carryless product.
    pub fn mul(a: &BigUint, b: &BigUint) -> BigUint {
        let mut out = BigUint::zero();
        for i in 0..a.bits() {
            if a.bit(i) {
                out ^= b << i;
            }
        }
        out
    }
}
