//! CBC padding-oracle attack against a length-framed TCP oracle.
//!
//! The server decrypts one committed ciphertext block per connection and then
//! answers batches of Q-blocks with one verdict byte each: 1 for valid PKCS#7
//! padding, anything else for invalid. Recovering a block costs one batch of
//! 256 guesses per byte position, right to left, plus the occasional
//! single-block resend to break ties at the padding boundary.

use crate::utils::{Result, BLOCK_SIZE};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("cannot resolve {0}")]
    Resolve(String),
    #[error("connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },
    #[error("oracle send failed: {0}")]
    Send(std::io::Error),
    #[error("oracle read failed: {0}")]
    Recv(std::io::Error),
    #[error("no valid padding candidate at byte {0}")]
    NoCandidate(usize),
    #[error("ciphertext length {0} is not a multiple of 16")]
    Alignment(usize),
    #[error("IV must be 16 bytes, got {0}")]
    BadIv(usize),
}

/// One oracle session: a fresh TCP connection committed to a single
/// ciphertext block.
pub struct Oracle {
    stream: TcpStream,
}

impl Oracle {
    pub fn connect(
        host: &str,
        port: u16,
        key_id: u16,
        block: &[u8; BLOCK_SIZE],
    ) -> Result<Self, OracleError> {
        let target = format!("{host}:{port}");
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| OracleError::Connect {
                target: target.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| OracleError::Resolve(target.clone()))?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|source| OracleError::Connect { target, source })?;
        stream.set_nodelay(true).map_err(OracleError::Send)?;
        let mut oracle = Self { stream };
        oracle
            .stream
            .write_u16::<LittleEndian>(key_id)
            .map_err(OracleError::Send)?;
        oracle.stream.write_all(block).map_err(OracleError::Send)?;
        Ok(oracle)
    }

    /// Sends `count` Q-blocks and reads exactly one verdict byte per block.
    /// Short reads loop inside `read_exact`; an early close is an error.
    pub fn query(&mut self, blocks: &[u8]) -> Result<Vec<u8>, OracleError> {
        let count = (blocks.len() / BLOCK_SIZE) as u16;
        self.stream
            .write_u16::<LittleEndian>(count)
            .map_err(OracleError::Send)?;
        self.stream.write_all(blocks).map_err(OracleError::Send)?;
        let mut verdicts = vec![0u8; count as usize];
        self.stream
            .read_exact(&mut verdicts)
            .map_err(OracleError::Recv)?;
        Ok(verdicts)
    }

    /// A zero count tells the server we are done with this block.
    pub fn finish(mut self) -> Result<(), OracleError> {
        self.stream
            .write_u16::<LittleEndian>(0)
            .map_err(OracleError::Send)
    }
}

/// A candidate Q-block for guessing byte `index` of the plaintext: the
/// already-recovered suffix is pinned to the current padding value, the
/// guessed byte carries `guess`, everything below stays zero.
fn q_block(
    plain: &[u8; BLOCK_SIZE],
    prev: &[u8; BLOCK_SIZE],
    index: usize,
    pad: u8,
    guess: u8,
) -> [u8; BLOCK_SIZE] {
    let mut q = [0u8; BLOCK_SIZE];
    for j in index + 1..BLOCK_SIZE {
        q[j] = plain[j] ^ pad ^ prev[j];
    }
    q[index] = guess ^ pad ^ prev[index];
    q
}

/// Multiple guesses can produce valid padding at the right edge (a plaintext
/// already ending 0x02 0x02, say). Flipping an earlier byte destroys every
/// accidental longer padding but leaves a true trailing 0x01 intact, so the
/// real guess keeps answering valid.
fn disambiguate(
    oracle: &mut Oracle,
    candidates: &[u8],
    plain: &[u8; BLOCK_SIZE],
    prev: &[u8; BLOCK_SIZE],
    index: usize,
    pad: u8,
) -> Result<u8, OracleError> {
    let flip = if index > 0 { index - 1 } else { 1 };
    for &candidate in candidates {
        let mut q = q_block(plain, prev, index, pad, candidate);
        q[flip] ^= 0xff;
        let verdict = oracle.query(&q)?;
        if verdict.first() == Some(&1) {
            return Ok(candidate);
        }
    }
    Err(OracleError::NoCandidate(index))
}

/// Recovers the plaintext of one ciphertext block over a fresh connection.
fn attack_block(
    host: &str,
    port: u16,
    key_id: u16,
    block: &[u8; BLOCK_SIZE],
    prev: &[u8; BLOCK_SIZE],
) -> Result<[u8; BLOCK_SIZE], OracleError> {
    let mut oracle = Oracle::connect(host, port, key_id, block)?;
    let mut plain = [0u8; BLOCK_SIZE];
    for index in (0..BLOCK_SIZE).rev() {
        let pad = (BLOCK_SIZE - index) as u8;
        let mut batch = Vec::with_capacity(256 * BLOCK_SIZE);
        for guess in 0..=255u8 {
            batch.extend_from_slice(&q_block(&plain, prev, index, pad, guess));
        }
        let verdicts = oracle.query(&batch)?;
        let candidates: Vec<u8> = verdicts
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 1)
            .map(|(guess, _)| guess as u8)
            .collect();
        // the accepted guess is the plaintext byte itself
        plain[index] = match candidates.as_slice() {
            [] => return Err(OracleError::NoCandidate(index)),
            [only] => *only,
            several => disambiguate(&mut oracle, several, &plain, prev, index, pad)?,
        };
    }
    oracle.finish()?;
    Ok(plain)
}

/// Attacks every block of an IV-prefixed CBC ciphertext and returns the
/// concatenated plaintext, padding included.
pub fn attack(
    host: &str,
    port: u16,
    key_id: u16,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let mut prev: [u8; BLOCK_SIZE] = iv
        .try_into()
        .map_err(|_| OracleError::BadIv(iv.len()))?;
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(OracleError::Alignment(ciphertext.len()).into());
    }
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        plaintext.extend_from_slice(&attack_block(host, port, key_id, &block, &prev)?);
        prev = block;
    }
    Ok(plaintext)
}
