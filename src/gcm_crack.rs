//! Key recovery for GCM under a repeated nonce.
//!
//! With the nonce fixed, every tag is GHASH_H(A, C) masked by the same
//! E0 = AES_K(Y0). Summing the tag equations of two messages washes the mask
//! out and leaves a known polynomial with the authentication key H as a root;
//! factoring it yields a handful of candidates, one of which validates
//! against a third message. With (H, E0) in hand, any (A, C) can be tagged.

use crate::factor;
use crate::gcm::{len_block, padded_blocks};
use crate::gf128::{FieldElement, PolyTag};
use crate::gfpoly::GfPoly;
use crate::utils::{Result, BLOCK_SIZE};
use anyhow::anyhow;
use rand::Rng;

pub struct Message<'a> {
    pub ad: &'a [u8],
    pub ciphertext: &'a [u8],
    pub tag: [u8; BLOCK_SIZE],
}

#[derive(Debug)]
pub struct Recovered {
    pub tag: [u8; BLOCK_SIZE],
    pub h: [u8; BLOCK_SIZE],
    pub mask: [u8; BLOCK_SIZE],
}

/// The formal GHASH polynomial S(H): every input block becomes a constant
/// coefficient, accumulated as S <- (S + block) * X with X standing in for
/// the unknown key.
pub fn ghash_poly(ad: &[u8], ciphertext: &[u8], poly: PolyTag) -> GfPoly {
    let x = GfPoly::x(poly);
    let l = len_block(ad.len() as u64 * 8, ciphertext.len() as u64 * 8);
    let mut s = GfPoly::zero(poly);
    for block in padded_blocks(ad)
        .iter()
        .chain(padded_blocks(ciphertext).iter())
        .chain(std::iter::once(&l))
    {
        let coefficient = GfPoly::constant(FieldElement::from_block(block, poly));
        s = s.add(&coefficient).mul(&x);
    }
    s
}

/// Horner evaluation of S at a concrete H.
pub fn eval_at(s: &GfPoly, h: FieldElement) -> FieldElement {
    let mut acc = FieldElement::zero(h.tag());
    for &coefficient in s.coeffs().iter().rev() {
        if !acc.is_zero() {
            acc = acc * h;
        }
        acc = acc + coefficient;
    }
    acc
}

/// F = S_i + S_j + (T_i xor T_j), monic; H is a root of F.
fn difference_poly(
    s_i: &GfPoly,
    tag_i: &[u8; BLOCK_SIZE],
    s_j: &GfPoly,
    tag_j: &[u8; BLOCK_SIZE],
    poly: PolyTag,
) -> GfPoly {
    let mut tags = [0u8; BLOCK_SIZE];
    for (out, (a, b)) in tags.iter_mut().zip(tag_i.iter().zip(tag_j)) {
        *out = a ^ b;
    }
    let constant = GfPoly::constant(FieldElement::from_block(&tags, poly));
    s_i.add(s_j).add(&constant).monic()
}

/// Runs the SFF/DDF/EDF pipeline and collects the roots of all linear
/// factors as key candidates.
fn key_candidates<R: Rng>(f: &GfPoly, rng: &mut R) -> Result<Vec<FieldElement>> {
    let mut candidates = vec![];
    for (square_free_part, _) in factor::square_free(f)? {
        for (product, d) in factor::distinct_degree(&square_free_part)? {
            if d != 1 {
                continue;
            }
            for lin in factor::equal_degree(&product, 1, rng)? {
                candidates.push(lin.coeffs()[0]);
            }
        }
    }
    Ok(candidates)
}

pub fn crack<R: Rng>(
    m1: &Message,
    m2: &Message,
    m3: &Message,
    forgery_ad: &[u8],
    forgery_ciphertext: &[u8],
    poly: PolyTag,
    rng: &mut R,
) -> Result<Recovered> {
    let s1 = ghash_poly(m1.ad, m1.ciphertext, poly);
    let s2 = ghash_poly(m2.ad, m2.ciphertext, poly);
    let s3 = ghash_poly(m3.ad, m3.ciphertext, poly);

    let f12 = difference_poly(&s1, &m1.tag, &s2, &m2.tag, poly);
    let f13 = difference_poly(&s1, &m1.tag, &s3, &m3.tag, poly);

    // H divides both difference polynomials, so their gcd is usually the
    // cheapest thing to factor; fall back to the full polynomials otherwise.
    let g = f12.gcd(&f13);
    let candidates = if !g.is_one() {
        key_candidates(&g, rng)?
    } else {
        let from_f12 = key_candidates(&f12, rng)?;
        if from_f12.is_empty() {
            key_candidates(&f13, rng)?
        } else {
            from_f12
        }
    };

    let (h, mask) = candidates
        .into_iter()
        .find_map(|candidate| {
            let mask = xor_block(&m1.tag, &eval_at(&s1, candidate).to_block());
            let expected = xor_block(&mask, &eval_at(&s3, candidate).to_block());
            (expected == m3.tag).then_some((candidate, mask))
        })
        .ok_or_else(|| anyhow!("no key candidate validates against the third message"))?;

    let s_forgery = ghash_poly(forgery_ad, forgery_ciphertext, poly);
    let tag = xor_block(&mask, &eval_at(&s_forgery, h).to_block());

    Ok(Recovered {
        tag,
        h: h.to_block(),
        mask,
    })
}

fn xor_block(a: &[u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b)) {
        *o = x ^ y;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcm;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn the_formal_polynomial_evaluates_to_ghash() {
        let h_block = gcm::aes_ecb_block(&[7; 16], &[0; 16]).unwrap();
        for poly in [PolyTag::P1, PolyTag::P2] {
            let ad = b"associated";
            let ct = b"twenty-two ciphertext bytes...";
            let s = ghash_poly(ad, ct, poly);
            // one AD block, two ciphertext blocks, the length block
            assert_eq!(s.deg(), 4);
            let h = FieldElement::from_block(&h_block, poly);
            let (digest, _) = gcm::ghash(&h_block, ad, ct, poly);
            assert_eq!(eval_at(&s, h).to_block(), digest);
        }
    }

    #[test]
    fn horner_handles_the_zero_polynomial() {
        let h = FieldElement::new(0x1234, PolyTag::P1);
        assert!(eval_at(&GfPoly::zero(PolyTag::P1), h).is_zero());
        let constant = GfPoly::constant(FieldElement::new(42, PolyTag::P1));
        assert_eq!(eval_at(&constant, h).value(), 42);
    }

    #[test]
    fn recovers_the_key_and_forges_a_tag() {
        let key = b"sixteen byte key";
        let nonce = b"repeated 96b";
        let poly = PolyTag::P1;

        let messages = [
            (&b"from: alice"[..], &b"pay mallory one hundred euros"[..]),
            (&b"from: bob"[..], &b"the gate code is 4512"[..]),
            (&b""[..], &b"attack at dawn, not before"[..]),
        ];
        let encrypted: Vec<gcm::Encrypted> = messages
            .iter()
            .map(|(ad, pt)| gcm::encrypt(key, nonce, pt, ad, poly).unwrap())
            .collect();
        let owned: Vec<Message> = messages
            .iter()
            .zip(&encrypted)
            .map(|((ad, _), enc)| Message {
                ad,
                ciphertext: &enc.ciphertext,
                tag: enc.tag,
            })
            .collect();

        let forgery_ad = b"from: mallory";
        let forgery_ct = &encrypted[0].ciphertext;

        let mut rng = StdRng::seed_from_u64(99);
        let recovered = crack(
            &owned[0],
            &owned[1],
            &owned[2],
            forgery_ad,
            forgery_ct,
            poly,
            &mut rng,
        )
        .unwrap();

        // the authentication key is AES_K(0) and the mask is AES_K(Y0)
        assert_eq!(recovered.h, gcm::aes_ecb_block(key, &[0; 16]).unwrap());
        let mut y0 = [0u8; 16];
        y0[..12].copy_from_slice(nonce);
        y0[15] = 1;
        assert_eq!(recovered.mask, gcm::aes_ecb_block(key, &y0).unwrap());

        // the forged tag matches what genuine GCM would produce
        let (digest, _) = gcm::ghash(&recovered.h, forgery_ad, forgery_ct, poly);
        assert_eq!(recovered.tag, xor_block(&recovered.mask, &digest));
    }

    #[test]
    fn works_under_the_alternate_polynomial() {
        let key = &[0x5a; 16];
        let nonce = &[3; 12];
        let poly = PolyTag::P2;

        let plaintexts: [&[u8]; 3] = [b"first message", b"second one, a bit longer", b"third"];
        let encrypted: Vec<gcm::Encrypted> = plaintexts
            .iter()
            .map(|pt| gcm::encrypt(key, nonce, pt, b"", poly).unwrap())
            .collect();
        let owned: Vec<Message> = encrypted
            .iter()
            .map(|enc| Message {
                ad: b"",
                ciphertext: &enc.ciphertext,
                tag: enc.tag,
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(4);
        let recovered = crack(
            &owned[0],
            &owned[1],
            &owned[2],
            b"",
            &encrypted[2].ciphertext,
            poly,
            &mut rng,
        )
        .unwrap();
        assert_eq!(recovered.h, gcm::aes_ecb_block(key, &[0; 16]).unwrap());
        // forging over message 3's own ciphertext reproduces its tag
        assert_eq!(recovered.tag, encrypted[2].tag);
    }
}
