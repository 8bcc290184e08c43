//! The action surface: decoding one testcase into a typed `Action` and
//! evaluating it into a reply object.
//!
//! Decoding happens in two steps — action name, then the arguments for that
//! name — so an unknown action or a malformed argument set is already an
//! error before anything runs. Dispatch itself is an exhaustive match.

use crate::utils::{
    b64_decode, b64_encode, decode_block, int_reply, json_to_bigint, Result, BLOCK_SIZE,
};
use crate::gf128::{self, FieldElement, PolyTag};
use crate::{calc, factor, gcm, gcm_crack, padding_oracle, rsa_factor};
use anyhow::{anyhow, bail, Context};
use num_bigint::{BigInt, BigUint};
use num_traits::One;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug)]
pub enum Action {
    Calc(CalcArgs),
    GfMul(GfBinaryArgs),
    GfDivmod(GfRawArgs),
    GfInv(GfUnaryArgs),
    GfDiv(GfBinaryArgs),
    GfPow(GfPowArgs),
    GfSqrt(GfUnaryArgs),
    GcmEncrypt(GcmEncryptArgs),
    GfpolyAdd(PolyBinaryArgs),
    GfpolyMul(PolyBinaryArgs),
    GfpolyDivmod(PolyBinaryArgs),
    GfpolyGcd(PolyBinaryArgs),
    GfpolyMonic(PolyUnaryArgs),
    GfpolyPow(PolyPowArgs),
    GfpolyPowmod(PolyPowmodArgs),
    GfpolyDiff(PolyFArgs),
    GfpolySqrt(PolyFArgs),
    GfpolySort(PolySortArgs),
    GfpolyFactorSff(PolyFArgs),
    GfpolyFactorDdf(PolyFArgs),
    GfpolyFactorEdf(PolyEdfArgs),
    GcmCrack(GcmCrackArgs),
    PaddingOracle(PaddingOracleArgs),
    RsaFactor(RsaFactorArgs),
}

#[derive(Debug, Deserialize)]
pub struct CalcArgs {
    pub lhs: Value,
    pub rhs: Value,
    pub op: String,
}

#[derive(Debug, Deserialize)]
pub struct GfBinaryArgs {
    pub a: String,
    pub b: String,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct GfRawArgs {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Deserialize)]
pub struct GfUnaryArgs {
    pub x: String,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct GfPowArgs {
    pub b: String,
    pub e: Value,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct GcmEncryptArgs {
    pub key: String,
    pub nonce: String,
    pub plaintext: String,
    pub ad: String,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolyBinaryArgs {
    #[serde(rename = "A")]
    pub a: Vec<String>,
    #[serde(rename = "B")]
    pub b: Vec<String>,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolyUnaryArgs {
    #[serde(rename = "A")]
    pub a: Vec<String>,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolyPowArgs {
    #[serde(rename = "A")]
    pub a: Vec<String>,
    pub e: Value,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolyPowmodArgs {
    #[serde(rename = "A")]
    pub a: Vec<String>,
    #[serde(rename = "M")]
    pub m: Vec<String>,
    pub e: Value,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolyFArgs {
    #[serde(rename = "F")]
    pub f: Vec<String>,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolySortArgs {
    pub polys: Vec<Vec<String>>,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PolyEdfArgs {
    #[serde(rename = "F")]
    pub f: Vec<String>,
    pub d: usize,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct CrackMessage {
    pub associated_data: Option<String>,
    pub ciphertext: String,
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct CrackForgery {
    pub associated_data: Option<String>,
    pub ciphertext: String,
}

#[derive(Debug, Deserialize)]
pub struct GcmCrackArgs {
    pub m1: CrackMessage,
    pub m2: CrackMessage,
    pub m3: CrackMessage,
    pub forgery: CrackForgery,
    pub poly: PolyTag,
}

#[derive(Debug, Deserialize)]
pub struct PaddingOracleArgs {
    pub hostname: String,
    pub port: u16,
    pub key_id: u16,
    pub iv: String,
    pub ciphertext: String,
}

#[derive(Debug, Deserialize)]
pub struct RsaFactorArgs {
    pub moduli: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTestcase {
    action: String,
    arguments: Value,
}

impl Action {
    /// Decodes `{action, arguments}` into a typed action.
    pub fn from_value(testcase: Value) -> Result<Self> {
        let raw: RawTestcase =
            serde_json::from_value(testcase).context("testcase must carry action and arguments")?;
        fn args<T: serde::de::DeserializeOwned>(name: &str, arguments: Value) -> Result<T> {
            serde_json::from_value(arguments).with_context(|| format!("arguments of {name}"))
        }
        let name = raw.action.as_str();
        let action = match name {
            "calc" => Action::Calc(args(name, raw.arguments)?),
            "gf_mul" => Action::GfMul(args(name, raw.arguments)?),
            "gf_divmod" => Action::GfDivmod(args(name, raw.arguments)?),
            "gf_inv" => Action::GfInv(args(name, raw.arguments)?),
            "gf_div" => Action::GfDiv(args(name, raw.arguments)?),
            "gf_pow" => Action::GfPow(args(name, raw.arguments)?),
            "gf_sqrt" => Action::GfSqrt(args(name, raw.arguments)?),
            "gcm_encrypt" => Action::GcmEncrypt(args(name, raw.arguments)?),
            "gfpoly_add" => Action::GfpolyAdd(args(name, raw.arguments)?),
            "gfpoly_mul" => Action::GfpolyMul(args(name, raw.arguments)?),
            "gfpoly_divmod" => Action::GfpolyDivmod(args(name, raw.arguments)?),
            "gfpoly_gcd" => Action::GfpolyGcd(args(name, raw.arguments)?),
            "gfpoly_monic" => Action::GfpolyMonic(args(name, raw.arguments)?),
            "gfpoly_pow" => Action::GfpolyPow(args(name, raw.arguments)?),
            "gfpoly_powmod" => Action::GfpolyPowmod(args(name, raw.arguments)?),
            "gfpoly_diff" => Action::GfpolyDiff(args(name, raw.arguments)?),
            "gfpoly_sqrt" => Action::GfpolySqrt(args(name, raw.arguments)?),
            "gfpoly_sort" => Action::GfpolySort(args(name, raw.arguments)?),
            "gfpoly_factor_sff" => Action::GfpolyFactorSff(args(name, raw.arguments)?),
            "gfpoly_factor_ddf" => Action::GfpolyFactorDdf(args(name, raw.arguments)?),
            "gfpoly_factor_edf" => Action::GfpolyFactorEdf(args(name, raw.arguments)?),
            "gcm_crack" => Action::GcmCrack(args(name, raw.arguments)?),
            "padding_oracle" => Action::PaddingOracle(args(name, raw.arguments)?),
            "rsa_factor" => Action::RsaFactor(args(name, raw.arguments)?),
            unknown => bail!("unknown action {unknown:?}"),
        };
        Ok(action)
    }

    pub fn run(&self) -> Result<Value> {
        use crate::gfpoly::GfPoly;
        match self {
            Action::Calc(a) => Ok(json!({ "answer": calc::calc(&a.lhs, &a.rhs, &a.op)? })),

            Action::GfMul(a) => {
                let (x, y) = field_pair(&a.a, &a.b, a.poly)?;
                Ok(json!({ "y": (x * y).to_b64() }))
            }
            Action::GfDivmod(a) => {
                let (q, r) = gf128::raw_divmod(&decode_block(&a.a)?, &decode_block(&a.b)?)?;
                Ok(json!({ "q": b64_encode(&q), "r": b64_encode(&r) }))
            }
            Action::GfInv(a) => {
                let x = FieldElement::from_b64(&a.x, a.poly)?;
                Ok(json!({ "y": x.inv()?.to_b64() }))
            }
            Action::GfDiv(a) => {
                let (x, y) = field_pair(&a.a, &a.b, a.poly)?;
                Ok(json!({ "q": x.div(y)?.to_b64() }))
            }
            Action::GfPow(a) => {
                let base = FieldElement::from_b64(&a.b, a.poly)?;
                Ok(json!({ "y": base.pow(&exponent(&a.e)?).to_b64() }))
            }
            Action::GfSqrt(a) => {
                let x = FieldElement::from_b64(&a.x, a.poly)?;
                Ok(json!({ "y": x.sqrt().to_b64() }))
            }

            Action::GcmEncrypt(a) => {
                let out = gcm::encrypt(
                    &b64_decode(&a.key)?,
                    &b64_decode(&a.nonce)?,
                    &b64_decode(&a.plaintext)?,
                    &b64_decode(&a.ad)?,
                    a.poly,
                )?;
                Ok(json!({
                    "ciphertext": b64_encode(&out.ciphertext),
                    "tag": b64_encode(&out.tag),
                    "L": b64_encode(&out.len_block),
                    "H": b64_encode(&out.h),
                }))
            }

            Action::GfpolyAdd(a) => {
                let (x, y) = poly_pair(&a.a, &a.b, a.poly)?;
                Ok(json!({ "S": x.add(&y).to_b64() }))
            }
            Action::GfpolyMul(a) => {
                let (x, y) = poly_pair(&a.a, &a.b, a.poly)?;
                Ok(json!({ "P": x.mul(&y).to_b64() }))
            }
            Action::GfpolyDivmod(a) => {
                let (x, y) = poly_pair(&a.a, &a.b, a.poly)?;
                let (q, r) = x.divmod(&y)?;
                Ok(json!({ "Q": q.to_b64(), "R": r.to_b64() }))
            }
            Action::GfpolyGcd(a) => {
                let (x, y) = poly_pair(&a.a, &a.b, a.poly)?;
                Ok(json!({ "G": x.gcd(&y).to_b64() }))
            }
            Action::GfpolyMonic(a) => {
                let x = GfPoly::from_b64(&a.a, a.poly)?;
                Ok(json!({ "monic": x.monic().to_b64() }))
            }
            Action::GfpolyPow(a) => {
                let x = GfPoly::from_b64(&a.a, a.poly)?;
                Ok(json!({ "Z": x.pow(&exponent(&a.e)?).to_b64() }))
            }
            Action::GfpolyPowmod(a) => {
                let x = GfPoly::from_b64(&a.a, a.poly)?;
                let m = GfPoly::from_b64(&a.m, a.poly)?;
                Ok(json!({ "Z": x.powmod(&exponent(&a.e)?, &m)?.to_b64() }))
            }
            Action::GfpolyDiff(a) => {
                let f = GfPoly::from_b64(&a.f, a.poly)?;
                Ok(json!({ "derivative": f.diff().to_b64() }))
            }
            Action::GfpolySqrt(a) => {
                let f = GfPoly::from_b64(&a.f, a.poly)?;
                Ok(json!({ "S": f.sqrt().to_b64() }))
            }
            Action::GfpolySort(a) => {
                let mut polys = a
                    .polys
                    .iter()
                    .map(|coeffs| GfPoly::from_b64(coeffs, a.poly))
                    .collect::<Result<Vec<_>>>()?;
                polys.sort();
                let sorted: Vec<Vec<String>> = polys.iter().map(GfPoly::to_b64).collect();
                Ok(json!({ "sorted_polys": sorted }))
            }

            Action::GfpolyFactorSff(a) => {
                let f = GfPoly::from_b64(&a.f, a.poly)?;
                let factors: Vec<Value> = factor::square_free(&f)?
                    .iter()
                    .map(|(factor, exponent)| {
                        json!({ "factor": factor.to_b64(), "exponent": exponent })
                    })
                    .collect();
                Ok(json!({ "factors": factors }))
            }
            Action::GfpolyFactorDdf(a) => {
                let f = GfPoly::from_b64(&a.f, a.poly)?;
                let factors: Vec<Value> = factor::distinct_degree(&f)?
                    .iter()
                    .map(|(factor, degree)| json!({ "factor": factor.to_b64(), "degree": degree }))
                    .collect();
                Ok(json!({ "factors": factors }))
            }
            Action::GfpolyFactorEdf(a) => {
                let f = GfPoly::from_b64(&a.f, a.poly)?;
                let factors: Vec<Vec<String>> =
                    factor::equal_degree(&f, a.d, &mut rand::thread_rng())?
                        .iter()
                        .map(GfPoly::to_b64)
                        .collect();
                Ok(json!({ "factors": factors }))
            }

            Action::GcmCrack(a) => {
                let m1 = crack_message(&a.m1)?;
                let m2 = crack_message(&a.m2)?;
                let m3 = crack_message(&a.m3)?;
                let forgery_ad = optional_b64(&a.forgery.associated_data)?;
                let forgery_ct = b64_decode(&a.forgery.ciphertext)?;
                let recovered = gcm_crack::crack(
                    &gcm_crack::Message {
                        ad: &m1.0,
                        ciphertext: &m1.1,
                        tag: m1.2,
                    },
                    &gcm_crack::Message {
                        ad: &m2.0,
                        ciphertext: &m2.1,
                        tag: m2.2,
                    },
                    &gcm_crack::Message {
                        ad: &m3.0,
                        ciphertext: &m3.1,
                        tag: m3.2,
                    },
                    &forgery_ad,
                    &forgery_ct,
                    a.poly,
                    &mut rand::thread_rng(),
                )?;
                Ok(json!({
                    "tag": b64_encode(&recovered.tag),
                    "H": b64_encode(&recovered.h),
                    "mask": b64_encode(&recovered.mask),
                }))
            }

            Action::PaddingOracle(a) => {
                let plaintext = padding_oracle::attack(
                    &a.hostname,
                    a.port,
                    a.key_id,
                    &b64_decode(&a.iv)?,
                    &b64_decode(&a.ciphertext)?,
                )?;
                Ok(json!({ "plaintext": b64_encode(&plaintext) }))
            }

            Action::RsaFactor(a) => {
                let moduli = a
                    .moduli
                    .iter()
                    .map(|m| {
                        let n = json_to_bigint(m)?;
                        if n <= BigInt::one() {
                            bail!("modulus must be greater than 1, got {n}");
                        }
                        Ok(n)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let factored: Vec<Value> = rsa_factor::shared_factors(&moduli)
                    .iter()
                    .map(|(p, q)| json!([int_reply(p), int_reply(q)]))
                    .collect();
                Ok(json!({ "factored_moduli": factored }))
            }
        }
    }
}

fn field_pair(a: &str, b: &str, poly: PolyTag) -> Result<(FieldElement, FieldElement)> {
    Ok((
        FieldElement::from_b64(a, poly)?,
        FieldElement::from_b64(b, poly)?,
    ))
}

fn poly_pair(
    a: &[String],
    b: &[String],
    poly: PolyTag,
) -> Result<(crate::gfpoly::GfPoly, crate::gfpoly::GfPoly)> {
    Ok((
        crate::gfpoly::GfPoly::from_b64(a, poly)?,
        crate::gfpoly::GfPoly::from_b64(b, poly)?,
    ))
}

fn exponent(e: &Value) -> Result<BigUint> {
    let e = json_to_bigint(e)?;
    BigUint::try_from(e).map_err(|_| anyhow!("exponent must be non-negative"))
}

/// Decodes one gcm_crack message into (ad, ciphertext, tag).
fn crack_message(m: &CrackMessage) -> Result<(Vec<u8>, Vec<u8>, [u8; BLOCK_SIZE])> {
    Ok((
        optional_b64(&m.associated_data)?,
        b64_decode(&m.ciphertext)?,
        decode_block(&m.tag)?,
    ))
}

fn optional_b64(input: &Option<String>) -> Result<Vec<u8>> {
    match input {
        Some(s) => b64_decode(s),
        None => Ok(vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(testcase: Value) -> Result<Value> {
        Action::from_value(testcase)?.run()
    }

    #[test]
    fn calc_action_round_trip() {
        let reply = run(json!({
            "action": "calc",
            "arguments": {"lhs": "2", "rhs": "3", "op": "+"}
        }))
        .unwrap();
        assert_eq!(reply, json!({"answer": 5}));
    }

    #[test]
    fn unknown_actions_fail_at_decode_time() {
        let err = Action::from_value(json!({
            "action": "gf_frobnicate",
            "arguments": {}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown action"));

        assert!(Action::from_value(json!({"arguments": {}})).is_err());
        assert!(Action::from_value(json!({
            "action": "gf_mul",
            "arguments": {"a": "AA=="}
        }))
        .is_err());
    }

    #[test]
    fn gf_mul_action_uses_the_ghash_vector() {
        let reply = run(json!({
            "action": "gf_mul",
            "arguments": {
                "a": "ARIAAAAAAAAAAAAAAAAAgA==",
                "b": "AgAAAAAAAAAAAAAAAAAAAA==",
                "poly": "p1"
            }
        }))
        .unwrap();
        assert_eq!(reply, json!({"y": "AARIAAAAAAAAAAAAAAAAAg=="}));
    }

    #[test]
    fn gf_inv_of_zero_is_an_action_error() {
        let err = run(json!({
            "action": "gf_inv",
            "arguments": {"x": "AAAAAAAAAAAAAAAAAAAAAA==", "poly": "p2"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("inverse"));
    }

    #[test]
    fn gfpoly_actions_speak_base64_coefficient_arrays() {
        let one = "gAAAAAAAAAAAAAAAAAAAAA==";
        let zero = "AAAAAAAAAAAAAAAAAAAAAA==";
        // (X + 1) * (X + 1) = X^2 + 1 in characteristic 2
        let reply = run(json!({
            "action": "gfpoly_mul",
            "arguments": {"A": [one, one], "B": [one, one], "poly": "p1"}
        }))
        .unwrap();
        assert_eq!(reply, json!({"P": [one, zero, one]}));

        let reply = run(json!({
            "action": "gfpoly_sort",
            "arguments": {"polys": [[one, one], [zero], [one]], "poly": "p1"}
        }))
        .unwrap();
        assert_eq!(
            reply,
            json!({"sorted_polys": [[zero], [one], [one, one]]})
        );
    }

    #[test]
    fn gfpoly_factor_edf_splits_linears() {
        let one = "gAAAAAAAAAAAAAAAAAAAAA==";
        let zero = "AAAAAAAAAAAAAAAAAAAAAA==";
        let x2 = "IAAAAAAAAAAAAAAAAAAAAA=="; // the element x^2
        // F = X * (X + x^2) = x^2 X + X^2
        let reply = run(json!({
            "action": "gfpoly_factor_edf",
            "arguments": {"F": [zero, x2, one], "d": 1, "poly": "p1"}
        }))
        .unwrap();
        assert_eq!(reply, json!({"factors": [[zero, one], [x2, one]]}));
    }

    #[test]
    fn rsa_factor_action_formats_pairs() {
        let reply = run(json!({
            "action": "rsa_factor",
            "arguments": {"moduli": [15, "21"]}
        }))
        .unwrap();
        assert_eq!(reply, json!({"factored_moduli": [[3, 5], [3, 7]]}));

        assert!(run(json!({
            "action": "rsa_factor",
            "arguments": {"moduli": [15, 0]}
        }))
        .is_err());
    }
}
