//! Edge-set checks shared by field and core validation.

use crate::access::{at, get_id, get_str, join, object, run_context};
use crate::arena::{AtomArena, Scope, is_tension, severity_rank};
use crate::violation::ContractViolation;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    pub edge_id: String,
    pub edge_type: String,
    pub src_atom_id: String,
    pub dst_atom_id: String,
    pub tension_atom_id: String,
}

impl EdgeView {
    fn order_key(&self) -> (&str, &str, &str, &str) {
        (
            self.src_atom_id.as_str(),
            self.dst_atom_id.as_str(),
            self.edge_type.as_str(),
            self.edge_id.as_str(),
        )
    }
}

/// Validate `edges` against the atoms of one document.
///
/// When `run_pair_id` is given, every edge must carry the same one.
/// An empty slice is valid.
pub fn validate_edges(
    edges: &[Value],
    arena: &AtomArena,
    scope: Scope,
    path: &str,
    run_pair_id: Option<&str>,
) -> Result<Vec<EdgeView>, ContractViolation> {
    let mut views = Vec::with_capacity(edges.len());
    let mut seen = HashSet::with_capacity(edges.len());
    for (pos, value) in edges.iter().enumerate() {
        let edge_path = at(path, pos);
        let view = parse_edge(value, &edge_path, run_pair_id)?;
        if !seen.insert(view.edge_id.clone()) {
            return Err(ContractViolation::DuplicateEdgeId {
                edge_id: view.edge_id,
            });
        }
        check_endpoints(&view, arena, scope)?;
        check_tension(&view, arena, scope)?;
        views.push(view);
    }

    for (index, pair) in views.windows(2).enumerate() {
        if pair[0].order_key() > pair[1].order_key() {
            return Err(ContractViolation::OrderingViolation {
                collection: "edges",
                index: index + 1,
                previous: pair[0].edge_id.clone(),
                current: pair[1].edge_id.clone(),
            });
        }
    }
    Ok(views)
}

fn parse_edge(
    value: &Value,
    path: &str,
    run_pair_id: Option<&str>,
) -> Result<EdgeView, ContractViolation> {
    let obj = object(value, path)?;
    let edge_id = get_id(obj, "edge_id", path)?.to_string();
    let edge_type = get_str(obj, "type", path)?;
    if !is_tension(edge_type) {
        return Err(ContractViolation::invalid(
            join(path, "type"),
            format!("`{edge_type}` is not a tension type"),
        ));
    }
    let severity = get_str(obj, "severity", path)?;
    if severity_rank(severity).is_none() {
        return Err(ContractViolation::invalid(
            join(path, "severity"),
            format!("unknown severity `{severity}`"),
        ));
    }
    get_id(obj, "rule", path)?;

    let context_path = join(path, "run_context");
    let edge_pair_id = match obj.get("run_context") {
        Some(value) => run_context(value, &context_path)?,
        None => return Err(ContractViolation::MissingKey { path: context_path }),
    };
    if let Some(expected) = run_pair_id
        && edge_pair_id != expected
    {
        return Err(ContractViolation::invalid(
            join(&context_path, "run_pair_id"),
            format!("`{edge_pair_id}` differs from the document's `{expected}`"),
        ));
    }

    Ok(EdgeView {
        edge_id,
        edge_type: edge_type.to_string(),
        src_atom_id: get_id(obj, "src_atom_id", path)?.to_string(),
        dst_atom_id: get_id(obj, "dst_atom_id", path)?.to_string(),
        tension_atom_id: get_id(obj, "tension_atom_id", path)?.to_string(),
    })
}

fn check_endpoints(
    view: &EdgeView,
    arena: &AtomArena,
    scope: Scope,
) -> Result<(), ContractViolation> {
    for (endpoint, atom_id) in [
        ("src_atom_id", &view.src_atom_id),
        ("dst_atom_id", &view.dst_atom_id),
    ] {
        if arena.get(atom_id).is_none() {
            return Err(ContractViolation::DanglingEdgeEndpoint {
                edge_id: view.edge_id.clone(),
                endpoint,
                atom_id: atom_id.clone(),
                scope: scope.label(),
            });
        }
    }
    Ok(())
}

// In a core the tension atom may have fallen outside the top-k.
fn check_tension(
    view: &EdgeView,
    arena: &AtomArena,
    scope: Scope,
) -> Result<(), ContractViolation> {
    let mismatch = |message: String| ContractViolation::EdgeTensionMismatch {
        edge_id: view.edge_id.clone(),
        message,
    };
    let Some(tension) = arena.get(&view.tension_atom_id) else {
        return match scope {
            Scope::Core => Ok(()),
            Scope::Field => Err(mismatch(format!(
                "tension atom `{}` is not in the field",
                view.tension_atom_id
            ))),
        };
    };
    if tension.atom_type != view.edge_type {
        return Err(mismatch(format!(
            "tension atom `{}` has type `{}`, edge has `{}`",
            view.tension_atom_id, tension.atom_type, view.edge_type
        )));
    }
    if let Some(links) = &tension.links
        && (links.gate_atom_id != view.src_atom_id || links.linked_atom_id != view.dst_atom_id)
    {
        return Err(mismatch(format!(
            "tension links ({}, {}) differ from endpoints ({}, {})",
            links.gate_atom_id, links.linked_atom_id, view.src_atom_id, view.dst_atom_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn atoms() -> Vec<Value> {
        vec![
            json!({"atom_id": "a_01", "type": "gate_flip", "severity": "crit", "title": "g",
                   "evidence": {"source": {"row_index": 0}}}),
            json!({"atom_id": "t_01", "type": "gate_metric_tension", "severity": "crit",
                   "title": "t",
                   "evidence": {"gate_atom_id": "a_01", "metric_atom_id": "a_02"}}),
            json!({"atom_id": "a_02", "type": "metric_delta", "severity": "warn", "title": "m",
                   "evidence": {"source": {"row_index": 0},
                                "baseline": 0.9, "candidate": 0.8, "delta": -0.1}}),
        ]
    }

    fn edge(edge_id: &str, src: &str, dst: &str, tension: &str) -> Value {
        json!({
            "edge_id": edge_id, "type": "gate_metric_tension",
            "src_atom_id": src, "dst_atom_id": dst, "severity": "crit",
            "tension_atom_id": tension, "rule": "same_family",
            "run_context": {"run_pair_id": "pair1_x"}
        })
    }

    fn arena() -> AtomArena {
        AtomArena::build(&atoms(), "atoms", Scope::Field).expect("arena")
    }

    #[test]
    fn empty_edge_set_is_valid() {
        let views = validate_edges(&[], &arena(), Scope::Field, "edges", None).expect("valid");
        assert!(views.is_empty());
    }

    #[test]
    fn well_formed_edge_passes() {
        let edges = [edge("e_01", "a_01", "a_02", "t_01")];
        let views = validate_edges(&edges, &arena(), Scope::Field, "edges", Some("pair1_x"))
            .expect("valid");
        assert_eq!(views[0].edge_id, "e_01");
    }

    #[test]
    fn dangling_endpoint_names_the_edge() {
        let edges = [edge("e_01", "a_01", "a_99", "t_01")];
        match validate_edges(&edges, &arena(), Scope::Field, "edges", None) {
            Err(ContractViolation::DanglingEdgeEndpoint {
                edge_id,
                endpoint,
                atom_id,
                scope,
            }) => {
                assert_eq!(edge_id, "e_01");
                assert_eq!(endpoint, "dst_atom_id");
                assert_eq!(atom_id, "a_99");
                assert_eq!(scope, "field");
            }
            other => panic!("expected dangling endpoint, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_edge_ids_are_rejected() {
        let edges = [
            edge("e_01", "a_01", "a_02", "t_01"),
            edge("e_01", "a_01", "a_02", "t_01"),
        ];
        assert_eq!(
            validate_edges(&edges, &arena(), Scope::Field, "edges", None).err(),
            Some(ContractViolation::DuplicateEdgeId {
                edge_id: "e_01".into()
            })
        );
    }

    #[test]
    fn edges_must_be_in_canonical_order() {
        let edges = [
            edge("e_00", "a_02", "a_01", "t_01"),
            edge("e_01", "a_01", "a_02", "t_01"),
        ];
        // The first edge fails tension agreement before order is checked.
        assert!(matches!(
            validate_edges(&edges, &arena(), Scope::Field, "edges", None),
            Err(ContractViolation::EdgeTensionMismatch { .. })
        ));

        let atoms = vec![
            json!({"atom_id": "a_01", "type": "gate_flip", "severity": "crit", "title": "g",
                   "evidence": {"source": {"row_index": 0}}}),
            json!({"atom_id": "a_02", "type": "metric_delta", "severity": "warn", "title": "m",
                   "evidence": {"source": {"row_index": 1},
                                "baseline": 0.9, "candidate": 0.8, "delta": -0.1}}),
        ];
        let arena = AtomArena::build(&atoms, "atoms", Scope::Core).expect("arena");
        let edges = [
            edge("e_02", "a_01", "a_02", "t_gone"),
            edge("e_01", "a_01", "a_02", "t_gone"),
        ];
        match validate_edges(&edges, &arena, Scope::Core, "edges", None) {
            Err(ContractViolation::OrderingViolation {
                collection,
                previous,
                current,
                ..
            }) => {
                assert_eq!(collection, "edges");
                assert_eq!(previous, "e_02");
                assert_eq!(current, "e_01");
            }
            other => panic!("expected ordering violation, got {other:?}"),
        }
    }

    #[test]
    fn missing_tension_atom_is_tolerated_only_in_a_core() {
        let atoms = vec![
            json!({"atom_id": "a_01", "type": "gate_flip", "severity": "crit", "title": "g",
                   "evidence": {"source": {"row_index": 0}}}),
            json!({"atom_id": "a_02", "type": "metric_delta", "severity": "warn", "title": "m",
                   "evidence": {"source": {"row_index": 0},
                                "baseline": 0.9, "candidate": 0.8, "delta": -0.1}}),
        ];
        let edges = [edge("e_01", "a_01", "a_02", "t_01")];
        let field = AtomArena::build(&atoms, "atoms", Scope::Field).expect("arena");
        assert!(matches!(
            validate_edges(&edges, &field, Scope::Field, "edges", None),
            Err(ContractViolation::EdgeTensionMismatch { .. })
        ));
        let core = AtomArena::build(&atoms, "atoms", Scope::Core).expect("arena");
        validate_edges(&edges, &core, Scope::Core, "edges", None).expect("core tolerates it");
    }

    #[test]
    fn non_tension_edge_type_is_rejected() {
        let mut bad = edge("e_01", "a_01", "a_02", "t_01");
        bad["type"] = json!("gate_flip");
        match validate_edges(&[bad], &arena(), Scope::Field, "edges", None) {
            Err(ContractViolation::InvalidValue { path, .. }) => assert_eq!(path, "edges[0].type"),
            other => panic!("expected invalid type, got {other:?}"),
        }
    }

    #[test]
    fn run_pair_id_must_match_document() {
        let edges = [edge("e_01", "a_01", "a_02", "t_01")];
        match validate_edges(&edges, &arena(), Scope::Field, "edges", Some("pair1_other")) {
            Err(ContractViolation::InvalidValue { path, .. }) => {
                assert_eq!(path, "edges[0].run_context.run_pair_id")
            }
            other => panic!("expected run pair mismatch, got {other:?}"),
        }
    }
}
