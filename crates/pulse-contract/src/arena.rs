//! Atom arena: every atom of a document parsed once into a flat view, with
//! an `atom_id → position` index used for all link resolution.

use crate::access::{at, get_id, get_object, get_str, join, object};
use crate::violation::ContractViolation;
use serde_json::Value;
use std::collections::HashMap;

pub const GATE_FLIP: &str = "gate_flip";
pub const METRIC_DELTA: &str = "metric_delta";
pub const OVERLAY_CHANGE: &str = "overlay_change";
pub const GATE_OVERLAY_TENSION: &str = "gate_overlay_tension";
pub const GATE_METRIC_TENSION: &str = "gate_metric_tension";

const ATOM_TYPES: [&str; 5] = [
    GATE_FLIP,
    METRIC_DELTA,
    OVERLAY_CHANGE,
    GATE_OVERLAY_TENSION,
    GATE_METRIC_TENSION,
];

pub(crate) fn atom_type(label: &str) -> Option<&'static str> {
    ATOM_TYPES.iter().copied().find(|known| *known == label)
}

pub(crate) fn is_tension(atom_type: &str) -> bool {
    atom_type == GATE_OVERLAY_TENSION || atom_type == GATE_METRIC_TENSION
}

pub(crate) fn severity_rank(label: &str) -> Option<u8> {
    match label {
        "crit" => Some(0),
        "warn" => Some(1),
        "info" => Some(2),
        _ => None,
    }
}

/// Which document the atoms belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every tension link and every edge's tension atom resolves in the document.
    Field,
    /// A top-k projection, which is not closed under tension links.
    ///
    /// A kept tension atom may name a gate or linked atom that ranked below k,
    /// and an edge may cite a tension atom that ranked below k. Such links are
    /// open: the target is only checked when it is present, and then its type
    /// must match. Edge endpoints stay closed; both must be selected atoms.
    /// Resolve open links against the source field named by
    /// `meta.source_field_digest`.
    Core,
}

impl Scope {
    pub fn label(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Core => "core",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensionLinks {
    pub gate_atom_id: String,
    /// `metric_atom_id` or `overlay_atom_id`.
    pub linked_key: &'static str,
    pub linked_atom_id: String,
    pub linked_type: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomView {
    pub atom_id: String,
    pub atom_type: &'static str,
    pub severity_rank: u8,
    pub links: Option<TensionLinks>,
    pub core_rank: Option<Value>,
}

impl AtomView {
    fn order_key(&self) -> (u8, &str, &str) {
        (self.severity_rank, self.atom_type, self.atom_id.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AtomArena {
    atoms: Vec<AtomView>,
    index: HashMap<String, usize>,
}

impl AtomArena {
    /// Parse `atoms`, checking per-atom shape, provenance, and id uniqueness.
    pub fn build(atoms: &[Value], path: &str, scope: Scope) -> Result<Self, ContractViolation> {
        let mut arena = Self {
            atoms: Vec::with_capacity(atoms.len()),
            index: HashMap::with_capacity(atoms.len()),
        };
        for (pos, value) in atoms.iter().enumerate() {
            let view = parse_atom(value, &at(path, pos), scope)?;
            if arena.index.insert(view.atom_id.clone(), pos).is_some() {
                return Err(ContractViolation::DuplicateAtomId {
                    atom_id: view.atom_id,
                });
            }
            arena.atoms.push(view);
        }
        Ok(arena)
    }

    pub fn get(&self, atom_id: &str) -> Option<&AtomView> {
        self.index.get(atom_id).map(|&pos| &self.atoms[pos])
    }

    pub fn atoms(&self) -> &[AtomView] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn tension_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.links.is_some()).count()
    }

    /// Re-derives `(severity_rank, type, atom_id)` and reports the first
    /// out-of-order pair.
    pub fn check_canonical_order(&self) -> Result<(), ContractViolation> {
        for (index, pair) in self.atoms.windows(2).enumerate() {
            if pair[0].order_key() > pair[1].order_key() {
                return Err(ContractViolation::OrderingViolation {
                    collection: "atoms",
                    index: index + 1,
                    previous: pair[0].atom_id.clone(),
                    current: pair[1].atom_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Every tension link must name an atom of the required type. In a core,
    /// a link to an atom outside the selection is not checked.
    pub fn check_links(&self, scope: Scope) -> Result<(), ContractViolation> {
        for atom in &self.atoms {
            let Some(links) = &atom.links else {
                continue;
            };
            for (link, target, expected) in [
                ("gate_atom_id", &links.gate_atom_id, GATE_FLIP),
                (links.linked_key, &links.linked_atom_id, links.linked_type),
            ] {
                match self.get(target) {
                    Some(found) if found.atom_type != expected => {
                        return Err(ContractViolation::LinkTypeMismatch {
                            atom_id: atom.atom_id.clone(),
                            link,
                            target: target.clone(),
                            expected,
                            actual: found.atom_type.to_string(),
                        });
                    }
                    Some(_) => {}
                    None if scope == Scope::Core => {}
                    None => {
                        return Err(ContractViolation::DanglingLink {
                            atom_id: atom.atom_id.clone(),
                            link,
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_atom(value: &Value, path: &str, scope: Scope) -> Result<AtomView, ContractViolation> {
    let obj = object(value, path)?;
    let atom_id = get_id(obj, "atom_id", path)?.to_string();

    let type_label = get_str(obj, "type", path)?;
    let atom_type = atom_type(type_label).ok_or_else(|| {
        ContractViolation::invalid(join(path, "type"), format!("unknown atom type `{type_label}`"))
    })?;

    let severity = get_str(obj, "severity", path)?;
    let severity_rank = severity_rank(severity).ok_or_else(|| {
        ContractViolation::invalid(join(path, "severity"), format!("unknown severity `{severity}`"))
    })?;

    get_str(obj, "title", path)?;
    let evidence_path = join(path, "evidence");
    let evidence = get_object(obj, "evidence", path)?;

    if atom_type == GATE_FLIP || atom_type == METRIC_DELTA {
        let row_index = evidence
            .get("source")
            .and_then(Value::as_object)
            .and_then(|source| source.get("row_index"))
            .and_then(Value::as_u64);
        if row_index.is_none() {
            return Err(ContractViolation::MissingProvenance {
                atom_id,
                atom_type: atom_type.to_string(),
            });
        }
    }

    if atom_type == METRIC_DELTA {
        for key in ["baseline", "candidate", "delta"] {
            if !evidence.get(key).is_some_and(Value::is_number) {
                return Err(ContractViolation::invalid(
                    join(&evidence_path, key),
                    "metric evidence must be a finite number",
                ));
            }
        }
    }

    let links = match atom_type {
        GATE_METRIC_TENSION => Some(tension_links(
            evidence,
            &evidence_path,
            "metric_atom_id",
            METRIC_DELTA,
        )?),
        GATE_OVERLAY_TENSION => Some(tension_links(
            evidence,
            &evidence_path,
            "overlay_atom_id",
            OVERLAY_CHANGE,
        )?),
        _ => None,
    };

    let core_rank = obj.get("core_rank").cloned();
    if scope == Scope::Field && core_rank.is_some() {
        return Err(ContractViolation::invalid(
            join(path, "core_rank"),
            "core_rank only appears on core atoms",
        ));
    }

    Ok(AtomView {
        atom_id,
        atom_type,
        severity_rank,
        links,
        core_rank,
    })
}

fn tension_links(
    evidence: &serde_json::Map<String, Value>,
    path: &str,
    linked_key: &'static str,
    linked_type: &'static str,
) -> Result<TensionLinks, ContractViolation> {
    Ok(TensionLinks {
        gate_atom_id: get_id(evidence, "gate_atom_id", path)?.to_string(),
        linked_key,
        linked_atom_id: get_id(evidence, linked_key, path)?.to_string(),
        linked_type,
    })
}
