//! Core projection validation.

use crate::access::{get, get_array, get_id, get_object, get_str, object, opt_str, run_context};
use crate::arena::{AtomArena, Scope};
use crate::edges::validate_edges;
use crate::field::check_tag;
use crate::violation::ContractViolation;
use crate::{ContractSummary, DOCUMENT_CORE};
use pulse_paradox::projector::{
    CORE_SCHEMA, CORE_VERSION, EdgePolicy, SelectionMethod, SelectionMetric, TieBreak,
};
use serde_json::Value;
use std::str::FromStr;

const MISSING: &str = "<missing>";

pub fn validate_core(document: &Value) -> Result<ContractSummary, ContractViolation> {
    let root = object(document, "")?;
    check_tag(root, "schema", CORE_SCHEMA, "")?;
    check_tag(root, "version", CORE_VERSION, "")?;
    let k = check_selection(get(root, "selection", "")?)?;

    let meta = get_object(root, "meta", "")?;
    get_id(meta, "source_field_digest", "meta")?;
    opt_str(meta, "created_at_utc", "meta")?;
    let run_pair_id = match meta.get("run_context") {
        Some(context) => Some(run_context(context, "meta.run_context")?),
        None => None,
    };

    let atoms = get_array(root, "atoms", "")?;
    let arena = AtomArena::build(atoms, "atoms", Scope::Core)?;
    if arena.len() > k {
        return Err(ContractViolation::SelectionInvalid {
            message: format!("core holds {} atom(s), selection.k is {k}", arena.len()),
        });
    }
    check_ranks(&arena)?;
    arena.check_canonical_order()?;
    arena.check_links(Scope::Core)?;

    let edges = validate_edges(
        get_array(root, "edges", "")?,
        &arena,
        Scope::Core,
        "edges",
        run_pair_id.as_deref(),
    )?;

    let index = get_object(root, "core", "")?;
    check_mirror(
        "core.atom_ids",
        get_array(index, "atom_ids", "core")?,
        arena.atoms().iter().map(|a| a.atom_id.as_str()),
    )?;
    check_mirror(
        "core.edge_ids",
        get_array(index, "edge_ids", "core")?,
        edges.iter().map(|e| e.edge_id.as_str()),
    )?;

    log::debug!(
        "core valid: {} atom(s), {} edge(s), k={k}",
        arena.len(),
        edges.len()
    );
    Ok(ContractSummary {
        document: DOCUMENT_CORE.to_string(),
        atom_count: arena.len(),
        tension_count: arena.tension_count(),
        edge_count: edges.len(),
        run_pair_id,
    })
}

/// Returns `k` once every recorded selection parameter is known.
fn check_selection(value: &Value) -> Result<usize, ContractViolation> {
    let selection = object(value, "selection")?;
    let k = get(selection, "k", "selection")?;
    let k = k
        .as_u64()
        .filter(|k| *k >= 1)
        .ok_or_else(|| ContractViolation::SelectionInvalid {
            message: format!("k must be an integer >= 1, got {k}"),
        })?;
    parse_param::<SelectionMetric>(selection, "metric")?;
    parse_param::<SelectionMethod>(selection, "method")?;
    parse_param::<TieBreak>(selection, "tie_break")?;
    parse_param::<EdgePolicy>(selection, "edge_policy")?;
    Ok(k as usize)
}

fn parse_param<T>(
    selection: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<T, ContractViolation>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_str(selection, key, "selection")?
        .parse::<T>()
        .map_err(|e| ContractViolation::SelectionInvalid {
            message: e.to_string(),
        })
}

/// `core_rank` must read 1, 2, ..., N down the atom array.
fn check_ranks(arena: &AtomArena) -> Result<(), ContractViolation> {
    for (position, atom) in arena.atoms().iter().enumerate() {
        let expected = position + 1;
        let actual = atom.core_rank.as_ref();
        if actual.and_then(Value::as_u64) != Some(expected as u64) {
            return Err(ContractViolation::RankViolation {
                atom_id: atom.atom_id.clone(),
                position,
                expected,
                actual: actual.map_or_else(|| MISSING.to_string(), Value::to_string),
            });
        }
    }
    Ok(())
}

fn check_mirror<'a>(
    index: &'static str,
    actual: &[Value],
    expected: impl Iterator<Item = &'a str>,
) -> Result<(), ContractViolation> {
    let expected: Vec<&str> = expected.collect();
    for position in 0..expected.len().max(actual.len()) {
        let want = expected.get(position).copied();
        let got = actual.get(position);
        if want.is_none() || got.and_then(Value::as_str) != want {
            return Err(ContractViolation::IndexMismatch {
                index,
                position,
                expected: want.unwrap_or(MISSING).to_string(),
                actual: got.map_or_else(
                    || MISSING.to_string(),
                    |v| v.as_str().map_or_else(|| v.to_string(), str::to_string),
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn atom(id: &str, atom_type: &str, severity: &str, rank: usize) -> Value {
        let evidence = match atom_type {
            "gate_metric_tension" => json!({"gate_atom_id": "a_01", "metric_atom_id": "a_02"}),
            "metric_delta" => json!({"source": {"row_index": 0},
                                     "baseline": 0.9, "candidate": 0.8, "delta": -0.1}),
            _ => json!({"source": {"row_index": 0}}),
        };
        json!({
            "atom_id": id, "type": atom_type, "severity": severity, "title": id,
            "evidence": evidence, "core_rank": rank
        })
    }

    fn core(k: usize, atoms: Vec<Value>, edges: Vec<Value>) -> Value {
        let atom_ids: Vec<Value> = atoms.iter().map(|a| a["atom_id"].clone()).collect();
        let edge_ids: Vec<Value> = edges.iter().map(|e| e["edge_id"].clone()).collect();
        json!({
            "schema": "PULSE_paradox_core_v0",
            "version": "v0",
            "selection": {"k": k, "metric": "severity", "method": "top_k",
                          "tie_break": "atom_id", "edge_policy": "drop_external"},
            "atoms": atoms,
            "edges": edges,
            "core": {"atom_ids": atom_ids, "edge_ids": edge_ids},
            "meta": {"source_field_digest": "field1_x", "run_context": {"run_pair_id": "pair1_x"}}
        })
    }

    fn edge() -> Value {
        json!({
            "edge_id": "e_01", "type": "gate_metric_tension",
            "src_atom_id": "a_01", "dst_atom_id": "a_02", "severity": "crit",
            "tension_atom_id": "t_01", "rule": "same_family",
            "run_context": {"run_pair_id": "pair1_x"}
        })
    }

    fn two_crit() -> Vec<Value> {
        vec![
            atom("a_01", "gate_flip", "crit", 1),
            atom("a_02", "gate_flip", "crit", 2),
        ]
    }

    #[test]
    fn tie_broken_core_validates() {
        let summary = validate_core(&core(2, two_crit(), Vec::new())).expect("valid core");
        assert_eq!(summary.document, "core");
        assert_eq!(summary.atom_count, 2);
        assert_eq!(summary.edge_count, 0);
    }

    #[test]
    fn empty_core_is_valid() {
        validate_core(&core(12, Vec::new(), Vec::new())).expect("empty core is valid");
    }

    #[test]
    fn rank_gap_is_rejected() {
        let atoms = vec![
            atom("a_01", "gate_flip", "crit", 1),
            atom("a_02", "gate_flip", "crit", 3),
        ];
        match validate_core(&core(3, atoms, Vec::new())) {
            Err(ContractViolation::RankViolation {
                atom_id,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(atom_id, "a_02");
                assert_eq!(expected, 2);
                assert_eq!(actual, "3");
            }
            other => panic!("expected rank violation, got {other:?}"),
        }
    }

    #[test]
    fn missing_rank_is_rejected() {
        let mut atoms = two_crit();
        atoms[1].as_object_mut().expect("object").remove("core_rank");
        assert!(matches!(
            validate_core(&core(2, atoms, Vec::new())),
            Err(ContractViolation::RankViolation { .. })
        ));
    }

    #[test]
    fn more_atoms_than_k_is_rejected() {
        assert!(matches!(
            validate_core(&core(1, two_crit(), Vec::new())),
            Err(ContractViolation::SelectionInvalid { .. })
        ));
    }

    #[test]
    fn unknown_selection_values_are_rejected() {
        let mut doc = core(2, two_crit(), Vec::new());
        doc["selection"]["tie_break"] = json!("random");
        assert!(matches!(
            validate_core(&doc),
            Err(ContractViolation::SelectionInvalid { .. })
        ));

        let mut doc = core(2, two_crit(), Vec::new());
        doc["selection"]["k"] = json!(0);
        assert!(matches!(
            validate_core(&doc),
            Err(ContractViolation::SelectionInvalid { .. })
        ));

        let mut doc = core(2, two_crit(), Vec::new());
        doc["selection"].as_object_mut().expect("object").remove("metric");
        assert_eq!(
            validate_core(&doc).err(),
            Some(ContractViolation::MissingKey {
                path: "selection.metric".into()
            })
        );
    }

    #[test]
    fn schema_tag_must_match_exactly() {
        let mut doc = core(2, two_crit(), Vec::new());
        doc["schema"] = json!("PULSE_paradox_core_v1");
        match validate_core(&doc) {
            Err(ContractViolation::SchemaMismatch { path, .. }) => assert_eq!(path, "schema"),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn index_mirror_must_match_atom_order() {
        let mut doc = core(2, two_crit(), Vec::new());
        doc["core"]["atom_ids"] = json!(["a_02", "a_01"]);
        match validate_core(&doc) {
            Err(ContractViolation::IndexMismatch {
                index,
                position,
                expected,
                actual,
            }) => {
                assert_eq!(index, "core.atom_ids");
                assert_eq!(position, 0);
                assert_eq!(expected, "a_01");
                assert_eq!(actual, "a_02");
            }
            other => panic!("expected index mismatch, got {other:?}"),
        }

        let mut doc = core(2, two_crit(), Vec::new());
        doc["core"]["edge_ids"] = json!(["e_01"]);
        assert!(matches!(
            validate_core(&doc),
            Err(ContractViolation::IndexMismatch { .. })
        ));
    }

    #[test]
    fn internal_edge_without_tension_atom_validates() {
        let atoms = vec![
            atom("a_01", "gate_flip", "crit", 1),
            atom("a_02", "metric_delta", "crit", 2),
        ];
        let summary = validate_core(&core(2, atoms, vec![edge()])).expect("valid core");
        assert_eq!(summary.edge_count, 1);
    }

    #[test]
    fn edge_to_dropped_atom_dangles() {
        let atoms = vec![atom("a_01", "gate_flip", "crit", 1)];
        match validate_core(&core(1, atoms, vec![edge()])) {
            Err(ContractViolation::DanglingEdgeEndpoint { scope, atom_id, .. }) => {
                assert_eq!(scope, "core");
                assert_eq!(atom_id, "a_02");
            }
            other => panic!("expected dangling endpoint, got {other:?}"),
        }
    }

    #[test]
    fn tension_in_core_keeps_type_discipline() {
        let atoms = vec![
            atom("a_01", "gate_flip", "crit", 1),
            atom("t_01", "gate_metric_tension", "crit", 2),
            atom("a_02", "overlay_change", "crit", 3),
        ];
        assert!(matches!(
            validate_core(&core(3, atoms, Vec::new())),
            Err(ContractViolation::LinkTypeMismatch { .. })
        ));
    }
}
