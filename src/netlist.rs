//! JSON network descriptions
//!
//! ```json
//! {
//!   "inputs": ["quacks", "flies", "swims", "croaks"],
//!   "assign": {
//!     "duck": {"op": "and", "args": ["quacks", {"op": "or", "args": ["flies", "swims"]}]},
//!     "grid": {"0": {"hit": {"op": "not", "args": ["quacks"]}}}
//!   }
//! }
//! ```
//!
//! Strings are dot-separated slot paths measured from the root; integer
//! segments address array-style children. An object with an `op` field
//! is an expression. Any other object in assignment position is a
//! mapping of child assignments, so a child cannot be named `op`.
//! Object order is preserved and decides index assignment order.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::expr::{self, Expr};
use crate::model::{Assignment, Key, Model, SlotId};

/// Top-level description
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetlistDef {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub assign: Map<String, Value>,
}

/// Parse a description and build its model
///
/// serde_json's nesting limit (128 levels) stays in force, which also
/// bounds the recursion of the builder below. Deeper networks are built
/// through the [`Model`] API, whose compiler does not recurse.
pub fn load_model(json: &str) -> Result<Model> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let def = NetlistDef::deserialize(&mut deserializer)?;
    deserializer.end()?;
    build_model(&def)
}

pub fn build_model(def: &NetlistDef) -> Result<Model> {
    let mut model = Model::new();

    for path in &def.inputs {
        let slot = resolve_path(&mut model, path)?;
        model.mark_input(slot);
    }

    let root = model.root();
    for (key, value) in &def.assign {
        let target = model.child(root, Key::parse(key));
        let assignment = to_assignment(&mut model, target, value)?;
        model.assign(target, assignment)?;
    }

    log::debug!(
        "loaded netlist: {} inputs, {} top-level assignments, {} slots",
        def.inputs.len(),
        def.assign.len(),
        model.peek_next_index()
    );
    Ok(model)
}

fn resolve_path(model: &mut Model, path: &str) -> Result<SlotId> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(Error::InvalidNetlist(format!("malformed slot path '{path}'")));
    }
    let root = model.root();
    Ok(model.path(root, path.split('.').map(Key::parse)))
}

fn to_assignment(model: &mut Model, target: SlotId, value: &Value) -> Result<Assignment> {
    match value {
        Value::String(_) => Ok(Assignment::Expr(to_expr(model, value, target)?)),
        Value::Object(map) if map.contains_key("op") => {
            Ok(Assignment::Expr(to_expr(model, value, target)?))
        }
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                let key = Key::parse(key);
                let child = model.child(target, key.clone());
                entries.push((key, to_assignment(model, child, value)?));
            }
            Ok(Assignment::Children(entries))
        }
        other => Err(Error::ForbiddenAssignment {
            name: model.name(target).to_string(),
            found: kind_of(other).to_string(),
        }),
    }
}

/// `target` is only used to name the assignment in errors
fn to_expr(model: &mut Model, value: &Value, target: SlotId) -> Result<Expr> {
    let map = match value {
        Value::String(path) => return Ok(Expr::reference(resolve_path(model, path)?)),
        Value::Object(map) if map.contains_key("op") => map,
        other => {
            return Err(Error::TypeMismatch {
                context: format!("definition of '{}'", model.name(target)),
                found: kind_of(other).to_string(),
            })
        }
    };

    let op = map
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidNetlist(format!("'op' must be a string in '{}'", model.name(target))))?;
    let args = match map.get("args") {
        Some(Value::Array(args)) => args,
        _ => {
            return Err(Error::InvalidNetlist(format!(
                "'{op}' in '{}' needs an 'args' array",
                model.name(target)
            )))
        }
    };

    let mut operands = Vec::with_capacity(args.len());
    for arg in args {
        operands.push(to_expr(model, arg, target)?);
    }

    let fold = |build: fn(Expr, Expr) -> Expr, operands: Vec<Expr>| -> Result<Expr> {
        if operands.len() < 2 {
            return Err(Error::InvalidNetlist(format!(
                "'{op}' takes at least two operands, got {}",
                operands.len()
            )));
        }
        let mut operands = operands.into_iter();
        let first = operands.next().ok_or_else(|| Error::InvalidNetlist(format!("'{op}' has no operands")))?;
        Ok(operands.fold(first, build))
    };

    match op {
        "not" => {
            if operands.len() != 1 {
                return Err(Error::InvalidNetlist(format!(
                    "'not' takes one operand, got {}",
                    operands.len()
                )));
            }
            Ok(expr::not(operands.remove(0)))
        }
        "and" => fold(|a, b| expr::and(a, b), operands),
        "or" => fold(|a, b| expr::or(a, b), operands),
        "xor" => fold(|a, b| expr::xor(a, b), operands),
        other => Err(Error::InvalidNetlist(format!("unknown operator '{other}'"))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Instr::*;
    use crate::core::Interpreter;
    use pretty_assertions::assert_eq;
    use test_log::test;

    const CLASSIFIER: &str = r#"{
        "inputs": ["quacks", "flies", "swims", "croaks"],
        "assign": {
            "duck": {"op": "and", "args": ["quacks", {"op": "or", "args": ["flies", "swims"]}]},
            "frog": {"op": "and", "args": ["croaks", "swims", {"op": "not", "args": ["flies"]}]}
        }
    }"#;

    #[test]
    fn test_classifier_from_json() {
        let model = load_model(CLASSIFIER).unwrap();
        let symbols = model.symbols();
        assert_eq!(symbols["quacks"], 0);
        assert_eq!(symbols["croaks"], 3);
        assert_eq!(symbols["duck"], 4);
        assert_eq!(symbols["frog"], 5);

        let program = model.compile().unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Load(0), Load(1), Load(2), Or, And, Store(4),
                Load(3), Load(2), And, Load(1), Not, And, Store(5),
            ]
        );

        let mut sim = Interpreter::new(program).unwrap();
        sim.poke(2, 1).unwrap();
        sim.poke(3, 1).unwrap();
        let state = sim.tick();
        assert_eq!(state[4], 0);
        assert_eq!(state[5], 1);
    }

    #[test]
    fn test_nested_mapping_and_index_keys() {
        let json = r#"{
            "inputs": ["x"],
            "assign": {"bus": {"0": "x", "1": {"op": "not", "args": ["x"]}}}
        }"#;
        let model = load_model(json).unwrap();
        let symbols = model.symbols();
        assert_eq!(symbols["bus.0"], 1);
        assert_eq!(symbols["bus.1"], 2);
        assert!(!symbols.contains_key("bus"));
    }

    #[test]
    fn test_token_ring_with_forward_references() {
        let json = r#"{
            "assign": {"t": {
                "0": "t.2", "1": "t.0", "2": "t.1"
            }}
        }"#;
        let model = load_model(json).unwrap();
        let program = model.compile().unwrap();
        let mut sim = Interpreter::new(program).unwrap();
        sim.poke(0, 1).unwrap();
        assert_eq!(sim.tick(), &[0, 1, 0]);
        assert_eq!(sim.tick(), &[0, 0, 1]);
        assert_eq!(sim.tick(), &[1, 0, 0]);
    }

    #[test]
    fn test_type_mismatch_for_non_expression_operand() {
        let json = r#"{"inputs": ["a"], "assign": {"out": {"op": "and", "args": ["a", 5]}}}"#;
        let err = load_model(json).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref found, .. } if found == "number"));
    }

    #[test]
    fn test_forbidden_assignment() {
        let json = r#"{"assign": {"out": 1}}"#;
        let err = load_model(json).unwrap_err();
        assert!(
            matches!(err, Error::ForbiddenAssignment { ref name, ref found } if name == "out" && found == "number")
        );

        let json = r#"{"assign": {"grid": {"0": [1, 2]}}}"#;
        let err = load_model(json).unwrap_err();
        assert!(matches!(err, Error::ForbiddenAssignment { ref name, .. } if name == "grid.0"));
    }

    #[test]
    fn test_assigning_an_input_is_rejected() {
        let json = r#"{"inputs": ["a"], "assign": {"a": "a"}}"#;
        assert!(matches!(load_model(json), Err(Error::AlreadyDefined { .. })));
    }

    #[test]
    fn test_structural_errors() {
        for json in [
            r#"{"assign": {"o": {"op": "nand", "args": ["a", "b"]}}}"#,
            r#"{"assign": {"o": {"op": "and", "args": ["a"]}}}"#,
            r#"{"assign": {"o": {"op": "not", "args": ["a", "b"]}}}"#,
            r#"{"assign": {"o": {"op": "not"}}}"#,
            r#"{"assign": {"o": "a..b"}}"#,
            r#"{"inputs": [""]}"#,
        ] {
            assert!(
                matches!(load_model(json), Err(Error::InvalidNetlist(_))),
                "{json}"
            );
        }
        assert!(matches!(load_model("{\"outputs\": []}"), Err(Error::Json(_))));
    }

    fn not_chain(depth: usize) -> String {
        let expr = format!(
            "{}\"a\"{}",
            r#"{"op": "not", "args": ["#.repeat(depth),
            "]}".repeat(depth)
        );
        format!(r#"{{"inputs": ["a"], "assign": {{"out": {expr}}}}}"#)
    }

    #[test]
    fn test_nesting_depth_is_capped() {
        let model = load_model(&not_chain(40)).unwrap();
        let program = model.compile().unwrap();
        assert_eq!(program.instructions().len(), 42);

        assert!(matches!(load_model(&not_chain(100_000)), Err(Error::Json(_))));
    }
}
