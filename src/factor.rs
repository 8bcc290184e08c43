//! Cantor–Zassenhaus factorization over GF(2^128)[X], split into the usual
//! three stages: square-free (SFF), distinct-degree (DDF) and equal-degree
//! (EDF) factorization. q denotes the field size 2^128 throughout.

use crate::gf128::{FieldElement, PolyTag};
use crate::gfpoly::{GfPoly, PolyError};
use num_bigint::BigUint;
use num_traits::One;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactorError {
    #[error(transparent)]
    Poly(#[from] PolyError),
    #[error("polynomial degree {degree} is not a multiple of {d}")]
    DegreeMismatch { degree: usize, d: usize },
}

/// Square-free factorization: (factor, exponent) pairs, sorted by factor.
///
/// Splitting off gcd(F, F') isolates repeated parts; whatever survives with
/// derivative zero is a perfect square in characteristic 2 and is handled by
/// recursing on its square root with doubled exponents.
pub fn square_free(f: &GfPoly) -> Result<Vec<(GfPoly, u64)>, FactorError> {
    let mut factors = sff(&f.monic())?;
    factors.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(factors)
}

fn sff(f: &GfPoly) -> Result<Vec<(GfPoly, u64)>, FactorError> {
    let c = f.gcd(&f.diff());
    let (mut f_cur, _) = f.divmod(&c)?;
    let mut c_cur = c;
    let mut factors = vec![];
    let mut e = 1;
    while !f_cur.is_one() {
        let y = f_cur.gcd(&c_cur);
        if f_cur != y {
            let (q, _) = f_cur.divmod(&y)?;
            factors.push((q.monic(), e));
        }
        let (c_next, _) = c_cur.divmod(&y)?;
        f_cur = y;
        c_cur = c_next;
        e += 1;
    }
    if !c_cur.is_one() {
        for (factor, exponent) in sff(&c_cur.sqrt())? {
            factors.push((factor, 2 * exponent));
        }
    }
    Ok(factors)
}

/// Distinct-degree factorization of a monic square-free polynomial:
/// (factor, degree) pairs where each factor is the product of all irreducible
/// divisors of that degree. Sorted by factor.
pub fn distinct_degree(f: &GfPoly) -> Result<Vec<(GfPoly, u64)>, FactorError> {
    let f = f.monic();
    let x = GfPoly::x(f.tag());
    let mut factors: Vec<(GfPoly, u64)> = vec![];
    let mut f_star = f.clone();
    let mut d: u64 = 1;
    while f_star.deg() as u64 >= 2 * d {
        // X^(q^d) - X vanishes exactly on the subfield of degree-d roots
        let h = x.powmod(&(BigUint::one() << (128 * d)), &f_star)?.add(&x);
        let g = h.gcd(&f_star);
        if !g.is_one() {
            factors.push((g.monic(), d));
            let (quotient, _) = f_star.divmod(&g)?;
            f_star = quotient.monic();
        }
        d += 1;
    }
    if !f_star.is_one() {
        let degree = f_star.deg() as u64;
        factors.push((f_star.monic(), degree));
    } else if factors.is_empty() {
        factors.push((f.clone(), 1));
    }
    factors.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(factors)
}

/// Equal-degree factorization of a monic square-free polynomial whose
/// irreducible factors all have degree d.
///
/// Random elements raised to (q^d - 1)/3 land in the order-3 subgroup of each
/// residue field, so subtracting 1 hits zero in roughly a third of them;
/// gcds against the working set then peel factors apart. The /3 exponent is
/// the characteristic-2 variant: q^d - 1 is odd, so the textbook /2 does not
/// divide the group order.
pub fn equal_degree<R: Rng>(
    f: &GfPoly,
    d: usize,
    rng: &mut R,
) -> Result<Vec<GfPoly>, FactorError> {
    let f = f.monic();
    if d == 0 || f.deg() % d != 0 {
        return Err(FactorError::DegreeMismatch { degree: f.deg(), d });
    }
    let n = f.deg() / d;
    let exponent = ((BigUint::one() << (128 * d as u64)) - BigUint::one()) / BigUint::from(3u32);
    let one = GfPoly::one(f.tag());
    let mut working = vec![f.clone()];
    while working.len() < n {
        let h = random_poly(f.deg(), f.tag(), rng);
        let t = h.powmod(&exponent, &f)?.add(&one);
        for u in working.clone() {
            if u.deg() <= d {
                continue;
            }
            let j = u.gcd(&t);
            if j.is_one() || j == u {
                continue;
            }
            if let Some(pos) = working.iter().position(|p| *p == u) {
                working.remove(pos);
                let (q, _) = u.divmod(&j)?;
                for part in [j.monic(), q.monic()] {
                    if part.deg() >= d {
                        working.push(part);
                    }
                }
            }
        }
    }
    let mut factors: Vec<GfPoly> = working
        .into_iter()
        .filter(|p| p.deg() == d && !p.is_one() && !p.is_zero())
        .map(|p| p.monic())
        .collect();
    factors.sort();
    Ok(factors)
}

fn random_poly<R: Rng>(max_deg: usize, tag: PolyTag, rng: &mut R) -> GfPoly {
    let deg = rng.gen_range(1..max_deg.max(2));
    let mut coeffs: Vec<FieldElement> = (0..=deg)
        .map(|_| FieldElement::new(rng.gen::<u128>(), tag))
        .collect();
    if coeffs.iter().all(|c| c.is_zero()) {
        coeffs[0] = FieldElement::one(tag);
    }
    GfPoly::new(coeffs, tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const TAG: PolyTag = PolyTag::P1;

    fn fe(value: u128) -> FieldElement {
        FieldElement::new(value, TAG)
    }

    fn linear(root: u128) -> GfPoly {
        GfPoly::new(vec![fe(root), fe(1)], TAG)
    }

    // X^2 + X + x^121; verified irreducible over GF(2^128) under P1.
    fn irreducible_quadratic() -> GfPoly {
        GfPoly::new(vec![fe(1 << 121), fe(1), fe(1)], TAG)
    }

    #[test]
    fn sff_recovers_multiplicities() {
        // F = (X+1)^2 * (X^2+X+alpha)^3 with a nonzero alpha
        let p = linear(1);
        let q = GfPoly::new(vec![fe(0x1234_5678), fe(1), fe(1)], TAG);
        let f = p
            .mul(&p)
            .mul(&q.mul(&q).mul(&q));
        let factors = square_free(&f).unwrap();
        assert_eq!(factors, vec![(p.clone(), 2), (q.clone(), 3)]);

        // the product of factor^exponent rebuilds monic(F)
        let rebuilt = factors
            .iter()
            .fold(GfPoly::one(TAG), |acc, (factor, e)| {
                acc.mul(&factor.pow(&BigUint::from(*e)))
            });
        assert_eq!(rebuilt, f.monic());
    }

    #[test]
    fn sff_of_a_squarefree_input_is_itself() {
        let f = linear(3).mul(&linear(9));
        assert_eq!(square_free(&f).unwrap(), vec![(f, 1)]);
    }

    #[test]
    fn ddf_groups_factors_by_degree() {
        let split = linear(5).mul(&linear(0xfeed));
        let quad = irreducible_quadratic();
        let factors = distinct_degree(&split.mul(&quad)).unwrap();
        // both results have degree 2; the quadratic's X-coefficient (1) sorts
        // below the linear product's (5 xor 0xfeed)
        assert_eq!(factors, vec![(quad, 2), (split, 1)]);
    }

    #[test]
    fn ddf_of_a_single_irreducible_reports_its_degree() {
        assert_eq!(
            distinct_degree(&linear(7)).unwrap(),
            vec![(linear(7), 1)]
        );
        assert_eq!(
            distinct_degree(&irreducible_quadratic()).unwrap(),
            vec![(irreducible_quadratic(), 2)]
        );
    }

    #[test]
    fn edf_splits_equal_degree_products() {
        let mut rng = StdRng::seed_from_u64(7);
        let parts = [linear(2), linear(0x55), linear(1 << 100)];
        let f = parts.iter().fold(GfPoly::one(TAG), |acc, p| acc.mul(p));
        let mut expected = parts.to_vec();
        expected.sort();
        assert_eq!(equal_degree(&f, 1, &mut rng).unwrap(), expected);
    }

    #[test]
    fn edf_rejects_a_degree_mismatch() {
        let mut rng = StdRng::seed_from_u64(1);
        let f = linear(2).mul(&linear(3)).mul(&linear(4));
        assert!(matches!(
            equal_degree(&f, 2, &mut rng),
            Err(FactorError::DegreeMismatch { degree: 3, d: 2 })
        ));
    }

    #[test]
    fn full_pipeline_finds_the_roots_of_a_cubic() {
        let mut rng = StdRng::seed_from_u64(42);
        let f = linear(0xaa).mul(&linear(0xbb)).mul(&irreducible_quadratic());
        let mut roots = vec![];
        for (square_free_part, _) in square_free(&f).unwrap() {
            for (product, d) in distinct_degree(&square_free_part).unwrap() {
                if d == 1 {
                    for lin in equal_degree(&product, 1, &mut rng).unwrap() {
                        roots.push(lin.coeffs()[0].value());
                    }
                }
            }
        }
        roots.sort_unstable();
        assert_eq!(roots, vec![0xaa, 0xbb]);
    }
}
