//! Atom derivation and tension linking for one run comparison.
//!
//! Given a baseline/candidate comparison, emits:
//! - `gate_flip` for every gate row whose outcome differs,
//! - `metric_delta` for every metric row that moved beyond `noop_epsilon`,
//! - `overlay_change` for every overlay leaf path that differs,
//! - a tension atom plus one edge for every (gate flip, metric/overlay)
//!   pair that some configured [`LinkRule`] accepts.
//!
//! Tensions record co-occurrence only. Nothing here infers causality.

use crate::atom::{
    Atom, AtomBody, AtomType, GateFlipEvidence, GateMetricTensionEvidence,
    GateOverlayTensionEvidence, MetricDeltaEvidence, OverlayChangeEvidence, RowSource, Severity,
    atom_id_for,
};
use crate::canonical::{content_digest, sort_edges, to_canonical_value};
use crate::config::LinkerConfig;
use crate::edge::{Edge, RunContext, edge_id_for, run_pair_id_for};
use crate::error::ParadoxError;
use crate::field::Field;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const GATE_TABLE: &str = "gates";
pub const METRIC_TABLE: &str = "metrics";

const DOCUMENT: &str = "comparison";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRow {
    pub gate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub baseline: bool,
    pub candidate: bool,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub baseline: f64,
    pub candidate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayPair {
    #[serde(default)]
    pub baseline: Value,
    #[serde(default)]
    pub candidate: Value,
}

/// Two comparable run states, row-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunComparison {
    pub baseline_run_id: String,
    pub candidate_run_id: String,
    #[serde(default)]
    pub gates: Vec<GateRow>,
    #[serde(default)]
    pub metrics: Vec<MetricRow>,
    #[serde(default)]
    pub overlays: OverlayPair,
}

impl RunComparison {
    pub fn from_json_str(text: &str) -> Result<Self, ParadoxError> {
        serde_json::from_str(text).map_err(|source| ParadoxError::Json {
            document: DOCUMENT.to_string(),
            source,
        })
    }

    /// Run context carrying `run_pair_id` and the comparison's content digest.
    pub fn run_context(&self) -> Result<RunContext, ParadoxError> {
        let digest = content_digest("sha256", &to_canonical_value(DOCUMENT, self)?);
        Ok(
            RunContext::new(run_pair_id_for(&self.baseline_run_id, &self.candidate_run_id))
                .with_digest("comparison_sha256", digest),
        )
    }

    fn check(&self) -> Result<(), ParadoxError> {
        if self.baseline_run_id.trim().is_empty() || self.candidate_run_id.trim().is_empty() {
            return Err(ParadoxError::malformed(
                DOCUMENT,
                "baseline_run_id and candidate_run_id must be non-empty",
            ));
        }
        let mut seen = BTreeSet::new();
        for row in &self.gates {
            if !seen.insert(row.gate_id.as_str()) {
                return Err(ParadoxError::malformed(
                    DOCUMENT,
                    format!("gate `{}` appears in more than one row", row.gate_id),
                ));
            }
        }
        seen.clear();
        for (idx, row) in self.metrics.iter().enumerate() {
            if !seen.insert(row.metric_id.as_str()) {
                return Err(ParadoxError::malformed(
                    DOCUMENT,
                    format!("metric `{}` appears in more than one row", row.metric_id),
                ));
            }
            let delta = row.candidate - row.baseline;
            for (side, value) in [
                ("baseline", row.baseline),
                ("candidate", row.candidate),
                ("delta", delta),
            ] {
                if !value.is_finite() {
                    return Err(ParadoxError::NonFinite {
                        path: format!("metrics[{idx}].{side}"),
                    });
                }
            }
        }
        for (side, value) in [
            ("baseline", &self.overlays.baseline),
            ("candidate", &self.overlays.candidate),
        ] {
            if !(value.is_object() || value.is_null()) {
                return Err(ParadoxError::malformed(
                    DOCUMENT,
                    format!("overlays.{side} must be an object or null"),
                ));
            }
            if let Some(path) = dotted_key(&format!("overlays.{side}"), value) {
                return Err(ParadoxError::malformed(
                    DOCUMENT,
                    format!("overlay key `{path}` contains `.`, which separates path segments"),
                ));
            }
        }
        Ok(())
    }
}

// First object key, at any depth, that would collide with a nested path.
fn dotted_key(prefix: &str, value: &Value) -> Option<String> {
    let Value::Object(map) = value else {
        return None;
    };
    map.iter().find_map(|(key, item)| {
        let path = format!("{prefix}.{key}");
        if key.contains('.') {
            Some(path)
        } else {
            dotted_key(&path, item)
        }
    })
}

/// Strategy deciding whether a gate flip and another change belong together.
pub trait LinkRule {
    fn name(&self) -> &'static str;

    fn links_metric(&self, gate: &GateFlipEvidence, metric: &MetricDeltaEvidence) -> bool;

    fn links_overlay(&self, gate: &GateFlipEvidence, overlay: &OverlayChangeEvidence) -> bool;
}

/// Links changes that share a gate/metric/overlay family.
pub struct SameFamily;

impl LinkRule for SameFamily {
    fn name(&self) -> &'static str {
        "same_family"
    }

    fn links_metric(&self, gate: &GateFlipEvidence, metric: &MetricDeltaEvidence) -> bool {
        gate.family.is_some() && gate.family == metric.family
    }

    fn links_overlay(&self, gate: &GateFlipEvidence, overlay: &OverlayChangeEvidence) -> bool {
        gate.family.is_some() && gate.family == overlay.family
    }
}

/// Links a gate flip and a metric delta taken from the same dataset row.
pub struct SameRow;

impl LinkRule for SameRow {
    fn name(&self) -> &'static str {
        "same_row"
    }

    fn links_metric(&self, gate: &GateFlipEvidence, metric: &MetricDeltaEvidence) -> bool {
        gate.source.row_index == metric.source.row_index
    }

    fn links_overlay(&self, _gate: &GateFlipEvidence, _overlay: &OverlayChangeEvidence) -> bool {
        false
    }
}

pub fn rule_by_name(name: &str) -> Option<Box<dyn LinkRule>> {
    match name {
        "same_family" => Some(Box::new(SameFamily)),
        "same_row" => Some(Box::new(SameRow)),
        _ => None,
    }
}

/// Family of an id: the prefix before the first `.`.
pub fn family_of(id: &str) -> &str {
    id.split_once('.').map_or(id, |(head, _)| head)
}

/// A field plus the edges derived alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBuild {
    pub field: Field,
    pub edges: Vec<Edge>,
}

pub fn build_field(
    comparison: &RunComparison,
    config: &LinkerConfig,
    run_context: RunContext,
) -> Result<FieldBuild, ParadoxError> {
    config.validate()?;
    comparison.check()?;
    let rules: Vec<Box<dyn LinkRule>> = config
        .rules
        .iter()
        .filter_map(|name| rule_by_name(name))
        .collect();

    let gates = gate_flip_atoms(comparison);
    let metrics = metric_delta_atoms(comparison, config);
    let overlays = overlay_change_atoms(comparison, config);

    let mut tensions = Vec::new();
    let mut edges = Vec::new();
    for gate_atom in &gates {
        let AtomBody::GateFlip(gate) = &gate_atom.body else {
            continue;
        };
        for other in metrics.iter().chain(overlays.iter()) {
            let (kind, rule) = match &other.body {
                AtomBody::MetricDelta(metric) => (
                    AtomType::GateMetricTension,
                    rules.iter().find(|rule| rule.links_metric(gate, metric)),
                ),
                AtomBody::OverlayChange(overlay) => (
                    AtomType::GateOverlayTension,
                    rules.iter().find(|rule| rule.links_overlay(gate, overlay)),
                ),
                _ => continue,
            };
            if let Some(rule) = rule {
                let (tension, edge) = link(kind, gate_atom, other, rule.name(), &run_context);
                tensions.push(tension);
                edges.push(edge);
            }
        }
    }

    log::debug!(
        "derived {} gate flip(s), {} metric delta(s), {} overlay change(s), {} tension(s)",
        gates.len(),
        metrics.len(),
        overlays.len(),
        tensions.len()
    );

    let atoms: Vec<Atom> = gates
        .into_iter()
        .chain(metrics)
        .chain(overlays)
        .chain(tensions)
        .collect();
    let field = Field::sealed(atoms, run_context, config.rules.clone())?;
    sort_edges(&mut edges);
    Ok(FieldBuild { field, edges })
}

fn gate_flip_atoms(comparison: &RunComparison) -> Vec<Atom> {
    comparison
        .gates
        .iter()
        .enumerate()
        .filter(|(_, row)| row.baseline != row.candidate)
        .map(|(idx, row)| {
            let evidence = GateFlipEvidence {
                source: RowSource::row(GATE_TABLE, idx),
                gate_id: row.gate_id.clone(),
                family: Some(
                    row.family
                        .clone()
                        .unwrap_or_else(|| family_of(&row.gate_id).to_string()),
                ),
                baseline: row.baseline,
                candidate: row.candidate,
                extra: Map::new(),
            };
            let severity = match (evidence.is_regression(), row.required) {
                (true, true) => Severity::Crit,
                (true, false) => Severity::Warn,
                (false, _) => Severity::Info,
            };
            let title = format!(
                "gate {} flipped {} -> {}",
                row.gate_id,
                outcome(row.baseline),
                outcome(row.candidate)
            );
            Atom::new(
                atom_id_for(AtomType::GateFlip, &row.gate_id),
                severity,
                title,
                AtomBody::GateFlip(evidence),
            )
        })
        .collect()
}

fn outcome(pass: bool) -> &'static str {
    if pass { "pass" } else { "fail" }
}

fn metric_delta_atoms(comparison: &RunComparison, config: &LinkerConfig) -> Vec<Atom> {
    comparison
        .metrics
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let delta = row.candidate - row.baseline;
            if delta.abs() <= config.thresholds.noop_epsilon {
                return None;
            }
            let evidence = MetricDeltaEvidence {
                source: RowSource::row(METRIC_TABLE, idx),
                metric_id: row.metric_id.clone(),
                family: Some(
                    row.family
                        .clone()
                        .unwrap_or_else(|| family_of(&row.metric_id).to_string()),
                ),
                baseline: row.baseline,
                candidate: row.candidate,
                delta,
                extra: Map::new(),
            };
            let title = format!(
                "metric {} moved {} -> {}",
                row.metric_id, row.baseline, row.candidate
            );
            Some(Atom::new(
                atom_id_for(AtomType::MetricDelta, &row.metric_id),
                config.metric_severity(delta),
                title,
                AtomBody::MetricDelta(evidence),
            ))
        })
        .collect()
}

fn overlay_change_atoms(comparison: &RunComparison, config: &LinkerConfig) -> Vec<Atom> {
    let mut baseline = BTreeMap::new();
    let mut candidate = BTreeMap::new();
    flatten_overlay("", &comparison.overlays.baseline, &mut baseline);
    flatten_overlay("", &comparison.overlays.candidate, &mut candidate);

    let paths: BTreeSet<&String> = baseline.keys().chain(candidate.keys()).collect();
    paths
        .into_iter()
        .filter_map(|path| {
            let before = baseline.get(path).cloned().unwrap_or(Value::Null);
            let after = candidate.get(path).cloned().unwrap_or(Value::Null);
            if before == after {
                return None;
            }
            let title = match (before.is_null(), after.is_null()) {
                (true, false) => format!("overlay {path} added"),
                (false, true) => format!("overlay {path} removed"),
                _ => format!("overlay {path} changed"),
            };
            let evidence = OverlayChangeEvidence {
                path: path.clone(),
                family: Some(family_of(path).to_string()),
                baseline: before,
                candidate: after,
                extra: Map::new(),
            };
            Some(Atom::new(
                atom_id_for(AtomType::OverlayChange, path),
                config.thresholds.overlay_severity,
                title,
                AtomBody::OverlayChange(evidence),
            ))
        })
        .collect()
}

/// Dotted leaf paths of an overlay object. Arrays and empty objects are leaves.
fn flatten_overlay(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, item) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_overlay(&path, item, out);
            }
        }
        Value::Null if prefix.is_empty() => {}
        _ => {
            out.insert(prefix.to_string(), value.clone());
        }
    }
}

fn link(
    kind: AtomType,
    gate_atom: &Atom,
    other: &Atom,
    rule: &str,
    run_context: &RunContext,
) -> (Atom, Edge) {
    let gate_atom_id = gate_atom.atom_id.clone();
    let other_id = other.atom_id.clone();
    let key = format!("{gate_atom_id}|{other_id}");
    let atom_id = atom_id_for(kind, &key);
    let severity = gate_atom.severity.most_severe(other.severity);
    let title = format!("{} co-occurs with {}", gate_atom.title, other.title);

    let body = match kind {
        AtomType::GateOverlayTension => AtomBody::GateOverlayTension(GateOverlayTensionEvidence {
            gate_atom_id: gate_atom_id.clone(),
            overlay_atom_id: other_id.clone(),
            rule: Some(rule.to_string()),
            extra: Map::new(),
        }),
        _ => AtomBody::GateMetricTension(GateMetricTensionEvidence {
            gate_atom_id: gate_atom_id.clone(),
            metric_atom_id: other_id.clone(),
            rule: Some(rule.to_string()),
            extra: Map::new(),
        }),
    };

    let edge = Edge {
        edge_id: edge_id_for(kind, &gate_atom_id, &other_id, &atom_id),
        edge_type: kind,
        src_atom_id: gate_atom_id,
        dst_atom_id: other_id,
        severity,
        tension_atom_id: atom_id.clone(),
        rule: rule.to_string(),
        run_context: run_context.clone(),
    };
    (Atom::new(atom_id, severity, title, body), edge)
}
