//! Arbitrary-precision integer calculator behind the `calc` action.

use crate::utils::{int_reply, json_to_bigint, Result};
use anyhow::bail;
use num_traits::Zero;
use serde_json::Value;

/// Evaluates `lhs op rhs`; division truncates toward zero, which is what
/// `BigInt`'s `/` already does.
pub fn calc(lhs: &Value, rhs: &Value, op: &str) -> Result<Value> {
    let lhs = json_to_bigint(lhs)?;
    let rhs = json_to_bigint(rhs)?;
    let answer = match op.trim() {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        "*" => lhs * rhs,
        "/" => {
            if rhs.is_zero() {
                bail!("division by zero");
            }
            lhs / rhs
        }
        other => bail!("invalid operator {other:?}"),
    };
    Ok(int_reply(&answer))
}
