use anyhow::{anyhow, bail};
use base64::{engine::general_purpose, Engine as _};
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use serde_json::Value;

pub use anyhow::Result;

/// AES block size; every field element and oracle block on the wire is one of these.
pub const BLOCK_SIZE: usize = 16;

pub fn b64_decode(input: &str) -> Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(input)?)
}

pub fn b64_encode(input: &[u8]) -> String {
    general_purpose::STANDARD.encode(input)
}

pub fn decode_block(input: &str) -> Result<[u8; BLOCK_SIZE]> {
    let bytes = b64_decode(input)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("expected a 16-byte block, got {} bytes", bytes.len()))
}

pub fn xor_bytes(a: &[u8], b: &[u8]) -> Vec<u8> {
    std::iter::zip(a, b).map(|(x, y)| x ^ y).collect()
}

/// Parses an integer argument the way the batch format allows it: a JSON
/// number of any width, or a string in base-auto notation (`0x`/`0o`/`0b`
/// prefix, otherwise decimal, optional sign).
pub fn json_to_bigint(value: &Value) -> Result<BigInt> {
    match value {
        Value::Number(n) => n
            .to_string()
            .parse()
            .map_err(|_| anyhow!("expected an integer, got {n}")),
        Value::String(s) => parse_int_auto(s),
        other => bail!("expected an integer or string, got {other}"),
    }
}

pub fn parse_int_auto(input: &str) -> Result<BigInt> {
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        bail!("invalid number: {input:?}");
    }
    let magnitude = BigInt::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| anyhow!("invalid number: {input:?}"))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Replies carry numbers as plain JSON integers while they fit in an i32 and
/// as hex strings beyond that.
pub fn int_reply(x: &BigInt) -> Value {
    match x.to_i32() {
        Some(small) => Value::from(small),
        None => Value::from(hex_int(x)),
    }
}

fn hex_int(x: &BigInt) -> String {
    match x.sign() {
        Sign::Minus => format!("-0x{:x}", x.magnitude()),
        _ => format!("0x{:x}", x.magnitude()),
    }
}
