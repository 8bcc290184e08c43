//! Batch evaluation: a JSON object of testcases in, one reply line out per
//! testcase. A failing action becomes an `{"error"}` reply and the batch
//! keeps going.

use crate::action::Action;
use crate::utils::Result;
use anyhow::bail;
use serde_json::{json, Map, Value};
use std::io::Write;

/// Accepts both input shapes: `{"testcases": {uuid: ...}, "expectedResults":
/// ...}` or a flat `{uuid: ...}` object. `expectedResults` belongs to the
/// external runner and is ignored here.
fn testcases(input: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut input) = input else {
        bail!("batch input must be a JSON object");
    };
    match input.remove("testcases") {
        Some(Value::Object(testcases)) => Ok(testcases),
        Some(other) => bail!("\"testcases\" must be an object, got {other}"),
        None => Ok(input),
    }
}

/// Evaluates one testcase; decode failures and action failures both come
/// back as error replies.
pub fn evaluate(testcase: Value) -> Value {
    let outcome = Action::from_value(testcase).and_then(|action| action.run());
    match outcome {
        Ok(reply) => reply,
        Err(e) => json!({ "error": format!("{e:#}") }),
    }
}

pub fn run<W: Write>(input: Value, out: &mut W) -> Result<()> {
    for (id, testcase) in testcases(input)? {
        let line = json!({ "id": id, "reply": evaluate(testcase) });
        writeln!(out, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: Value) -> Vec<Value> {
        let mut buffer = vec![];
        run(input, &mut buffer).unwrap();
        String::from_utf8(buffer)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn flat_form_emits_one_line_per_testcase() {
        let out = lines(json!({
            "aaaa": {"action": "calc", "arguments": {"lhs": 2, "rhs": 3, "op": "*"}},
            "bbbb": {"action": "calc", "arguments": {"lhs": 1, "rhs": 0, "op": "/"}},
        }));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({"id": "aaaa", "reply": {"answer": 6}}));
        assert_eq!(out[1]["id"], "bbbb");
        assert!(out[1]["reply"]["error"]
            .as_str()
            .unwrap()
            .contains("division by zero"));
    }

    #[test]
    fn testcases_form_ignores_expected_results() {
        let out = lines(json!({
            "testcases": {
                "c1": {"action": "calc", "arguments": {"lhs": "0x10", "rhs": 1, "op": "-"}}
            },
            "expectedResults": {"c1": {"answer": 15}},
        }));
        assert_eq!(out, vec![json!({"id": "c1", "reply": {"answer": 15}})]);
    }

    #[test]
    fn unknown_actions_become_error_replies() {
        let out = lines(json!({
            "z": {"action": "warp_drive", "arguments": {}}
        }));
        assert!(out[0]["reply"]["error"]
            .as_str()
            .unwrap()
            .contains("unknown action"));
    }

    #[test]
    fn non_object_input_is_rejected() {
        let mut buffer = vec![];
        assert!(run(json!([1, 2, 3]), &mut buffer).is_err());
        assert!(run(json!({"testcases": 7}), &mut buffer).is_err());
    }
}
