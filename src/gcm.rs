//! AES-GCM encryption with a selectable GHASH reduction polynomial.
//!
//! CTR mode over AES-128-ECB single blocks, with the tag built as
//! AES_K(Y0) xor GHASH_H(A, C); P2 exists purely so the field layer can be
//! exercised against a second modulus.

use crate::gf128::{FieldElement, PolyTag};
use crate::utils::{xor_bytes, Result, BLOCK_SIZE};
use anyhow::ensure;
use byteorder::{BigEndian, ByteOrder};
use openssl::symm::{Cipher, Crypter, Mode};

#[derive(Debug)]
pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; BLOCK_SIZE],
    pub len_block: [u8; BLOCK_SIZE],
    pub h: [u8; BLOCK_SIZE],
}

/// Encrypts a single 16-byte block with AES-128 in ECB mode.
pub fn aes_ecb_block(key: &[u8], block: &[u8; BLOCK_SIZE]) -> Result<[u8; BLOCK_SIZE]> {
    ensure!(key.len() == 16, "AES-128 key must be 16 bytes, got {}", key.len());
    let mut crypter = Crypter::new(Cipher::aes_128_ecb(), Mode::Encrypt, key, None)?;
    // Pad is on by default and would append a padding block
    crypter.pad(false);
    let mut buffer = [0u8; 2 * BLOCK_SIZE];
    crypter.update(block, &mut buffer)?;
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&buffer[..BLOCK_SIZE]);
    Ok(out)
}

/// Increments the last four bytes of a counter block as a big-endian u32,
/// wrapping; the 12-byte nonce prefix is untouched.
pub fn inc32(counter: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = *counter;
    let next = BigEndian::read_u32(&out[12..]).wrapping_add(1);
    BigEndian::write_u32(&mut out[12..], next);
    out
}

/// The GHASH length block: bit lengths of A and C, each as a big-endian u64.
pub fn len_block(ad_bits: u64, ct_bits: u64) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    BigEndian::write_u64(&mut out[..8], ad_bits);
    BigEndian::write_u64(&mut out[8..], ct_bits);
    out
}

/// Splits into 16-byte blocks, zero-padding the trailing one.
pub fn padded_blocks(data: &[u8]) -> Vec<[u8; BLOCK_SIZE]> {
    data.chunks(BLOCK_SIZE)
        .map(|chunk| {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            block
        })
        .collect()
}

/// GHASH over zero-padded A, zero-padded C and the length block:
/// X <- (X xor block) * H per block. Returns (digest, length block).
pub fn ghash(
    h: &[u8; BLOCK_SIZE],
    ad: &[u8],
    ciphertext: &[u8],
    poly: PolyTag,
) -> ([u8; BLOCK_SIZE], [u8; BLOCK_SIZE]) {
    let h = FieldElement::from_block(h, poly);
    let l = len_block(ad.len() as u64 * 8, ciphertext.len() as u64 * 8);
    let mut x = FieldElement::zero(poly);
    for block in padded_blocks(ad)
        .iter()
        .chain(padded_blocks(ciphertext).iter())
        .chain(std::iter::once(&l))
    {
        x = (x + FieldElement::from_block(block, poly)) * h;
    }
    (x.to_block(), l)
}

pub fn encrypt(
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
    ad: &[u8],
    poly: PolyTag,
) -> Result<Encrypted> {
    ensure!(nonce.len() == 12, "GCM nonce must be 12 bytes, got {}", nonce.len());
    let h = aes_ecb_block(key, &[0u8; BLOCK_SIZE])?;

    // Y0 = nonce || 1 masks the tag; data counters start at nonce || 2
    let mut y0 = [0u8; BLOCK_SIZE];
    y0[..12].copy_from_slice(nonce);
    y0[15] = 1;
    let mut counter = inc32(&y0);

    let mut ciphertext = Vec::with_capacity(plaintext.len());
    for chunk in plaintext.chunks(BLOCK_SIZE) {
        let keystream = aes_ecb_block(key, &counter)?;
        ciphertext.extend_from_slice(&xor_bytes(chunk, &keystream));
        counter = inc32(&counter);
    }

    let (digest, len_block) = ghash(&h, ad, &ciphertext, poly);
    let mask = aes_ecb_block(key, &y0)?;
    let mut tag = [0u8; BLOCK_SIZE];
    tag.copy_from_slice(&xor_bytes(&mask, &digest));

    Ok(Encrypted {
        ciphertext,
        tag,
        len_block,
        h,
    })
}
