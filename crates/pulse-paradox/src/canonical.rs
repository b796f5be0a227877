//! Canonical ordering and byte-stable JSON emission.
//!
//! Every document this crate writes goes through [`render_canonical`] or
//! [`render_jsonl`]: object keys sorted recursively, no insignificant
//! whitespace variation, finite floats only. Digests are taken over
//! [`canonical_json_bytes`], the compact form of the same value.

use crate::atom::Atom;
use crate::edge::Edge;
use crate::error::ParadoxError;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

const SHORT_DIGEST_HEX_LEN: usize = 16;

/// Canonical atom order key: `(severity_rank, type, atom_id)`.
pub fn atom_order_key(atom: &Atom) -> (u8, &'static str, &str) {
    (
        atom.severity.rank(),
        atom.atom_type().as_str(),
        atom.atom_id.as_str(),
    )
}

/// Canonical edge order key: `(src_atom_id, dst_atom_id, type, edge_id)`.
pub fn edge_order_key(edge: &Edge) -> (&str, &str, &'static str, &str) {
    (
        edge.src_atom_id.as_str(),
        edge.dst_atom_id.as_str(),
        edge.edge_type.as_str(),
        edge.edge_id.as_str(),
    )
}

pub fn sort_atoms(atoms: &mut [Atom]) {
    atoms.sort_by(|a, b| atom_order_key(a).cmp(&atom_order_key(b)));
}

pub fn sort_edges(edges: &mut [Edge]) {
    edges.sort_by(|a, b| edge_order_key(a).cmp(&edge_order_key(b)));
}

/// Recursively rebuild objects with lexicographically sorted keys.
pub fn sort_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            let mut sorted = Map::new();
            for key in keys {
                if let Some(item) = map.get(key) {
                    sorted.insert(key.clone(), sort_json_value(item));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_json_value).collect()),
        _ => value.clone(),
    }
}

/// Compact canonical bytes: sorted keys, no whitespace.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Array(items) => {
            out.push(b'[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_scalar(key, out);
                out.push(b':');
                write_canonical(item, out);
            }
            out.push(b'}');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar<T: Serialize + ?Sized>(value: &T, out: &mut Vec<u8>) {
    serde_json::to_writer(&mut *out, value).expect("scalar json writes into a Vec");
}

/// Serialize to a key-sorted `Value`.
///
/// serde_json maps NaN and infinities to `null`, so callers reject
/// non-finite numbers before they reach this point.
pub fn to_canonical_value<T: Serialize>(document: &str, value: &T) -> Result<Value, ParadoxError> {
    let value = serde_json::to_value(value).map_err(|source| ParadoxError::Json {
        document: document.to_string(),
        source,
    })?;
    Ok(sort_json_value(&value))
}

/// Pretty, key-sorted document bytes with a trailing newline.
pub fn render_canonical<T: Serialize>(document: &str, value: &T) -> Result<String, ParadoxError> {
    let value = to_canonical_value(document, value)?;
    let mut rendered =
        serde_json::to_string_pretty(&value).map_err(|source| ParadoxError::Json {
            document: document.to_string(),
            source,
        })?;
    rendered.push('\n');
    Ok(rendered)
}

/// One compact, key-sorted object per line. Empty input renders as "".
pub fn render_jsonl<T: Serialize>(document: &str, items: &[T]) -> Result<String, ParadoxError> {
    let mut out = String::new();
    for item in items {
        let value = to_canonical_value(document, item)?;
        let line = String::from_utf8(canonical_json_bytes(&value))
            .expect("canonical json bytes are utf-8");
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// `<prefix>_<sha256 of canonical bytes>`.
pub fn content_digest(prefix: &str, value: &Value) -> String {
    format!("{prefix}_{}", sha256_hex(&canonical_json_bytes(value)))
}

pub(crate) fn short_digest(value: &Value) -> String {
    let mut full = sha256_hex(&canonical_json_bytes(value));
    full.truncate(SHORT_DIGEST_HEX_LEN);
    full
}
