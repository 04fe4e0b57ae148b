//! Parameter validation before a call crosses into the interpreter.
//!
//! Nothing here coerces. Strings are not parsed as numbers, booleans are not
//! numbers and `null` is only accepted as an element of a nullable vector.
//! Interpreting raw cell values is the executor's job.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::registry::{MethodDescriptor, ParamKind, ParamSpec};

/// Named arguments for one call.
pub type Args = Map<String, Value>;

/// Check one value against its declared kind.
pub fn validate(spec: &ParamSpec, value: &Value) -> Result<()> {
    check_kind(spec.kind, value).map_err(|got| Error::Validation {
        param: spec.name.clone(),
        expected: spec.kind,
        got,
    })
}

/// Validate a full args map against a method descriptor.
///
/// The map is closed: keys the method does not declare are rejected, which
/// surfaces drift between the registry and generated callers.
pub fn validate_args(descriptor: &MethodDescriptor, args: &Args) -> Result<()> {
    if let Some(key) = args.keys().find(|k| descriptor.param(k).is_none()) {
        return Err(Error::UnknownParameter {
            method: descriptor.method_id.clone(),
            param: key.clone(),
        });
    }

    for spec in &descriptor.params {
        match args.get(&spec.name) {
            Some(value) => validate(spec, value)?,
            None if spec.optional => {}
            None => {
                return Err(Error::MissingParameter {
                    method: descriptor.method_id.clone(),
                    param: spec.name.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Short description of a JSON value's shape for error messages.
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_finite_number(value: &Value) -> bool {
    value.as_f64().is_some_and(f64::is_finite)
}

fn check_kind(kind: ParamKind, value: &Value) -> std::result::Result<(), String> {
    match kind {
        ParamKind::Number => expect(is_finite_number(value), value),
        ParamKind::String => expect(value.is_string(), value),
        ParamKind::Boolean => expect(value.is_boolean(), value),
        ParamKind::NumberVector => check_elements(value, is_finite_number),
        ParamKind::StringVector => check_elements(value, Value::is_string),
        ParamKind::StringOrNumberVector => {
            check_elements(value, |v| v.is_string() || is_finite_number(v))
        }
        ParamKind::NullableNumberVector => {
            check_elements(value, |v| v.is_null() || is_finite_number(v))
        }
        ParamKind::NumberMatrix => check_matrix(value, true),
        ParamKind::NumberVectorOrMatrix => {
            let rows = value
                .as_array()
                .ok_or_else(|| describe(value).to_string())?;
            if rows.iter().any(Value::is_array) {
                check_matrix(value, false)
            } else {
                check_elements(value, is_finite_number)
            }
        }
    }
}

fn expect(ok: bool, value: &Value) -> std::result::Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(describe(value).to_string())
    }
}

fn check_elements(
    value: &Value,
    accept: impl Fn(&Value) -> bool,
) -> std::result::Result<(), String> {
    let items = value
        .as_array()
        .ok_or_else(|| describe(value).to_string())?;
    match items.iter().position(|item| !accept(item)) {
        Some(i) => Err(format!("array with {} at index {}", describe(&items[i]), i)),
        None => Ok(()),
    }
}

fn check_matrix(value: &Value, rectangular: bool) -> std::result::Result<(), String> {
    let rows = value
        .as_array()
        .ok_or_else(|| describe(value).to_string())?;
    let mut width = None;
    for (r, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .ok_or_else(|| format!("array with {} at row {}", describe(row), r))?;
        if let Some(c) = cells.iter().position(|cell| !is_finite_number(cell)) {
            return Err(format!(
                "matrix with {} at [{}][{}]",
                describe(&cells[c]),
                r,
                c
            ));
        }
        if rectangular {
            match width {
                Some(w) if w != cells.len() => {
                    return Err(format!(
                        "ragged matrix (row {} has {} columns, expected {})",
                        r,
                        cells.len(),
                        w
                    ));
                }
                _ => width = Some(cells.len()),
            }
        }
    }
    Ok(())
}
