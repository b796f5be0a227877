//! Field document validation.

use crate::access::{get, get_array, join, object, opt_str, run_context};
use crate::arena::{AtomArena, Scope};
use crate::edges::validate_edges;
use crate::violation::ContractViolation;
use crate::{ContractSummary, DOCUMENT_FIELD};
use pulse_paradox::canonical::content_digest;
use pulse_paradox::field::{FIELD_SCHEMA, FIELD_VERSION, FIELD_WRAPPER_KEY};
use serde_json::{Map, Value, json};

#[derive(Debug, Default)]
struct MetaView<'a> {
    run_context: Option<&'a Value>,
    run_pair_id: Option<String>,
    atom_count: Option<u64>,
    field_digest: Option<&'a str>,
}

/// Validate a field document and, optionally, its edge set.
///
/// Accepts the wrapped `{"paradox_field_v0": {meta, atoms}}` form, where
/// `meta` is mandatory, and the legacy top-level `{atoms, meta?}` form.
pub fn validate_field(
    document: &Value,
    edges: Option<&[Value]>,
) -> Result<ContractSummary, ContractViolation> {
    let root = object(document, "")?;
    let (body, base) = match root.get(FIELD_WRAPPER_KEY) {
        Some(inner) => (object(inner, FIELD_WRAPPER_KEY)?, FIELD_WRAPPER_KEY),
        None => (root, ""),
    };

    let meta_path = join(base, "meta");
    let meta = match body.get("meta") {
        Some(raw) => Some(check_meta(raw, &meta_path)?),
        None if !base.is_empty() => return Err(ContractViolation::MissingKey { path: meta_path }),
        None => None,
    };

    let atoms_path = join(base, "atoms");
    let atoms = get_array(body, "atoms", base)?;
    let arena = AtomArena::build(atoms, &atoms_path, Scope::Field)?;
    arena.check_canonical_order()?;
    arena.check_links(Scope::Field)?;

    let meta = meta.unwrap_or_default();
    if let Some(count) = meta.atom_count
        && count != atoms.len() as u64
    {
        return Err(ContractViolation::invalid(
            join(&meta_path, "atom_count"),
            format!("records {count} atom(s), document has {}", atoms.len()),
        ));
    }
    if let Some(recorded) = meta.field_digest {
        let derived = content_digest(
            "field1",
            &json!({
                "atoms": atoms,
                "run_context": meta.run_context.cloned().unwrap_or(Value::Null),
            }),
        );
        if recorded != derived {
            return Err(ContractViolation::DigestMismatch {
                recorded: recorded.to_string(),
                derived,
            });
        }
    }

    let edges = validate_edges(
        edges.unwrap_or(&[]),
        &arena,
        Scope::Field,
        "edges",
        meta.run_pair_id.as_deref(),
    )?;

    log::debug!(
        "field valid: {} atom(s), {} edge(s)",
        arena.len(),
        edges.len()
    );
    Ok(ContractSummary {
        document: DOCUMENT_FIELD.to_string(),
        atom_count: arena.len(),
        tension_count: arena.tension_count(),
        edge_count: edges.len(),
        run_pair_id: meta.run_pair_id,
    })
}

fn check_meta<'a>(raw: &'a Value, path: &str) -> Result<MetaView<'a>, ContractViolation> {
    let meta = object(raw, path)?;
    check_tag(meta, "schema", FIELD_SCHEMA, path)?;
    check_tag(meta, "version", FIELD_VERSION, path)?;

    let mut view = MetaView::default();
    if let Some(context) = meta.get("run_context") {
        view.run_pair_id = Some(run_context(context, &join(path, "run_context"))?);
        view.run_context = Some(context);
    }
    if let Some(rules) = meta.get("rules") {
        let all_strings = rules
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            return Err(ContractViolation::invalid(
                join(path, "rules"),
                "expected an array of rule names",
            ));
        }
    }
    if let Some(count) = meta.get("atom_count") {
        view.atom_count = Some(count.as_u64().ok_or_else(|| {
            ContractViolation::invalid(join(path, "atom_count"), "expected a non-negative integer")
        })?);
    }
    view.field_digest = opt_str(meta, "field_digest", path)?;
    opt_str(meta, "created_at_utc", path)?;
    Ok(view)
}

pub(crate) fn check_tag(
    obj: &Map<String, Value>,
    key: &str,
    expected: &str,
    path: &str,
) -> Result<(), ContractViolation> {
    let actual = get(obj, key, path)?;
    if actual.as_str() != Some(expected) {
        return Err(ContractViolation::SchemaMismatch {
            path: join(path, key),
            expected: expected.to_string(),
            actual: actual
                .as_str()
                .map_or_else(|| actual.to_string(), str::to_string),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_paradox::{LinkerConfig, RunComparison, build_field, render_jsonl};

    fn gate(id: &str, severity: &str) -> Value {
        json!({
            "atom_id": id, "type": "gate_flip", "severity": severity, "title": id,
            "evidence": {"source": {"row_index": 0, "table": "gates"}, "gate_id": id,
                         "baseline": true, "candidate": false}
        })
    }

    fn wrapped(atoms: Vec<Value>) -> Value {
        json!({
            "paradox_field_v0": {
                "meta": {"schema": "PULSE_paradox_field_v0", "version": "v0",
                         "run_context": {"run_pair_id": "pair1_x"}},
                "atoms": atoms
            }
        })
    }

    fn built() -> (Value, Vec<Value>) {
        let comparison = RunComparison::from_json_str(
            r#"{
                "baseline_run_id": "run-1",
                "candidate_run_id": "run-2",
                "gates": [{"gate_id": "q1.accuracy", "baseline": true, "candidate": false}],
                "metrics": [{"metric_id": "q1.auc", "baseline": 0.9, "candidate": 0.7}],
                "overlays": {"baseline": {"q1": {"t": 1}}, "candidate": {"q1": {"t": 2}}}
            }"#,
        )
        .expect("comparison");
        let context = comparison.run_context().expect("context");
        let build = build_field(&comparison, &LinkerConfig::default(), context).expect("build");
        let field = build.field.to_value().expect("field value");
        let edges = render_jsonl("edges", &build.edges)
            .expect("edges")
            .lines()
            .map(|line| serde_json::from_str(line).expect("edge line"))
            .collect();
        (field, edges)
    }

    #[test]
    fn built_field_and_edges_validate() {
        let (field, edges) = built();
        let summary =
            validate_field(&field, Some(edges.as_slice())).expect("producer output is valid");
        assert_eq!(summary.document, "field");
        assert_eq!(summary.tension_count, 2);
        assert_eq!(summary.edge_count, 2);
        assert!(summary.run_pair_id.is_some_and(|id| id.starts_with("pair1_")));
    }

    #[test]
    fn tampered_atoms_break_the_digest() {
        let (mut field, _) = built();
        field["paradox_field_v0"]["atoms"][0]["title"] = json!("edited by hand");
        match validate_field(&field, None) {
            Err(ContractViolation::DigestMismatch { recorded, derived }) => {
                assert_ne!(recorded, derived)
            }
            other => panic!("expected digest mismatch, got {other:?}"),
        }
    }

    #[test]
    fn empty_field_with_zero_edges_is_valid() {
        let summary = validate_field(&wrapped(Vec::new()), Some(&[][..])).expect("valid");
        assert_eq!(summary.atom_count, 0);
        assert_eq!(summary.edge_count, 0);
        assert_eq!(summary.run_pair_id.as_deref(), Some("pair1_x"));
    }

    #[test]
    fn legacy_form_without_meta_is_valid() {
        let doc = json!({"atoms": [gate("a_01", "crit"), gate("a_02", "crit")]});
        let summary = validate_field(&doc, None).expect("legacy field is valid");
        assert_eq!(summary.atom_count, 2);
        assert_eq!(summary.run_pair_id, None);
    }

    #[test]
    fn wrapped_form_requires_meta_and_exact_tags() {
        let doc = json!({"paradox_field_v0": {"atoms": []}});
        assert_eq!(
            validate_field(&doc, None).err(),
            Some(ContractViolation::MissingKey {
                path: "paradox_field_v0.meta".into()
            })
        );

        let mut doc = wrapped(Vec::new());
        doc["paradox_field_v0"]["meta"]["version"] = json!("v1");
        match validate_field(&doc, None) {
            Err(ContractViolation::SchemaMismatch { path, actual, .. }) => {
                assert_eq!(path, "paradox_field_v0.meta.version");
                assert_eq!(actual, "v1");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_atoms_is_reported() {
        let doc = json!({"meta": {"schema": "PULSE_paradox_field_v0", "version": "v0"}});
        assert_eq!(
            validate_field(&doc, None).err(),
            Some(ContractViolation::MissingKey {
                path: "atoms".into()
            })
        );
    }

    #[test]
    fn out_of_order_atoms_are_not_repaired() {
        let doc = wrapped(vec![gate("a_02", "crit"), gate("a_01", "crit")]);
        assert!(matches!(
            validate_field(&doc, None),
            Err(ContractViolation::OrderingViolation { .. })
        ));
    }

    #[test]
    fn atom_count_must_match() {
        let mut doc = wrapped(vec![gate("a_01", "crit")]);
        doc["paradox_field_v0"]["meta"]["atom_count"] = json!(2);
        assert!(matches!(
            validate_field(&doc, None),
            Err(ContractViolation::InvalidValue { .. })
        ));
    }

    #[test]
    fn validator_and_projector_agree_on_hand_written_fields() {
        let mut note = gate("a_01", "crit");
        note["note"] = json!("kept verbatim");
        let metric = json!({
            "atom_id": "a_02", "type": "metric_delta", "severity": "warn", "title": "m",
            "evidence": {"source": {"row_index": 0}, "metric_id": "q1.auc",
                         "baseline": 1, "candidate": 2, "delta": 1}
        });
        let atoms = vec![note, metric];
        let run_context = json!({"run_pair_id": "pair1_x"});
        let digest = content_digest("field1", &json!({"atoms": atoms, "run_context": run_context}));
        let mut doc = wrapped(atoms);
        doc["paradox_field_v0"]["meta"]["field_digest"] = json!(digest);

        validate_field(&doc, None).expect("hand-written field is valid");

        let field = pulse_paradox::Field::from_value(doc).expect("field should parse");
        let core = pulse_paradox::project_core(
            &field,
            &[],
            &pulse_paradox::Selection::new(2).expect("k"),
            &pulse_paradox::ProjectOptions::default(),
        )
        .expect("projector accepts what the validator accepts");
        assert_eq!(core.meta.source_field_digest, digest);
        assert_eq!(core.atoms[0].extra.get("note"), Some(&json!("kept verbatim")));

        let rendered: Value =
            serde_json::from_str(&core.render().expect("core should render")).expect("json");
        assert_eq!(rendered["atoms"][0]["note"], "kept verbatim");
        crate::validate_core(&rendered).expect("projected core is valid");
    }
}
