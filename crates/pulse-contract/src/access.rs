//! Typed lookups over untyped JSON, reporting dotted paths on failure.

use crate::violation::ContractViolation;
use serde_json::{Map, Value};

pub(crate) fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

pub(crate) fn at(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

pub(crate) fn object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<&'a Map<String, Value>, ContractViolation> {
    value.as_object().ok_or_else(|| {
        ContractViolation::invalid(display_path(path), "expected a JSON object")
    })
}

pub(crate) fn get<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Value, ContractViolation> {
    obj.get(key).ok_or_else(|| ContractViolation::MissingKey {
        path: join(path, key),
    })
}

pub(crate) fn get_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, ContractViolation> {
    get(obj, key, path)?
        .as_str()
        .ok_or_else(|| ContractViolation::invalid(join(path, key), "expected a string"))
}

pub(crate) fn get_id<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, ContractViolation> {
    let id = get_str(obj, key, path)?;
    if id.trim().is_empty() {
        return Err(ContractViolation::invalid(
            join(path, key),
            "expected a non-empty string",
        ));
    }
    Ok(id)
}

pub(crate) fn get_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], ContractViolation> {
    get(obj, key, path)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ContractViolation::invalid(join(path, key), "expected an array"))
}

pub(crate) fn get_object<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ContractViolation> {
    object(get(obj, key, path)?, &join(path, key))
}

/// Optional string; present-but-not-a-string is a violation.
pub(crate) fn opt_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a str>, ContractViolation> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ContractViolation::invalid(join(path, key), "expected a string")),
    }
}

/// Checks a run context object and returns its `run_pair_id`.
pub(crate) fn run_context(value: &Value, path: &str) -> Result<String, ContractViolation> {
    let obj = object(value, path)?;
    for (key, item) in obj {
        if !item.is_string() {
            return Err(ContractViolation::invalid(
                join(path, key),
                "run context values must be strings",
            ));
        }
    }
    Ok(get_id(obj, "run_pair_id", path)?.to_string())
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}
