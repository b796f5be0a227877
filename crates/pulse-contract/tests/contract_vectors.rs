//! Contract vectors.
//!
//! Each fixture directory holds `case.json` naming the document kind
//! (`field` or `core`), the document itself as `<kind>.json`, an optional
//! `edges.jsonl` for fields, and `expect.json` with either the summary counts
//! or the `error_class` of the first violation.

use pulse_contract::{validate_core, validate_field};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

fn fixture_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("bad json in {}: {e}", path.display()))
}

fn edge_lines(path: &Path) -> Option<Vec<Value>> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(
        text.lines()
            .map(|line| serde_json::from_str(line).expect("edge line should parse"))
            .collect(),
    )
}

fn check(name: &str) {
    let dir = fixture_dir(name);
    let kind = load(&dir.join("case.json"))["document"]
        .as_str()
        .expect("case.document")
        .to_string();
    let document = load(&dir.join(format!("{kind}.json")));
    let expected = load(&dir.join("expect.json"));

    let outcome = match kind.as_str() {
        "field" => {
            let edges = edge_lines(&dir.join("edges.jsonl"));
            validate_field(&document, edges.as_deref())
        }
        "core" => validate_core(&document),
        other => panic!("fixture {name}: unknown document kind `{other}`"),
    };
    let actual = match outcome {
        Ok(summary) => {
            assert_eq!(summary.document, kind);
            json!({
                "atom_count": summary.atom_count,
                "tension_count": summary.tension_count,
                "edge_count": summary.edge_count,
            })
        }
        Err(violation) => json!({ "error_class": violation.class() }),
    };

    assert_eq!(actual, expected, "fixture {name}");
}

#[test]
fn field_legacy_accepted() {
    check("field_legacy_accepted");
}

#[test]
fn field_wrapped_requires_meta() {
    check("field_wrapped_requires_meta");
}

#[test]
fn field_link_type_mismatch() {
    check("field_link_type_mismatch");
}

#[test]
fn field_metric_without_provenance() {
    check("field_metric_without_provenance");
}

#[test]
fn field_digest_mismatch() {
    check("field_digest_mismatch");
}

#[test]
fn core_accepted_with_internal_edge() {
    check("core_accepted_with_internal_edge");
}

#[test]
fn core_rank_gap() {
    check("core_rank_gap");
}

#[test]
fn core_edge_leaves_core() {
    check("core_edge_leaves_core");
}

#[test]
fn core_exceeds_k() {
    check("core_exceeds_k");
}
