//! Atoms: typed facts about one run comparison.
//!
//! On the wire an atom is a flat object
//! `{atom_id, type, severity, title, evidence, core_rank?}`. In memory the
//! `type`/`evidence` pair is a tagged union, so evidence that does not fit its
//! declared type is rejected at the parse boundary instead of being walked
//! with optional lookups later.

use crate::canonical::short_digest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Identifier of an atom, unique within one field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(String);

impl AtomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AtomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AtomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Severity of an atom or edge. Variant order is significance order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Crit,
    Warn,
    Info,
}

impl Severity {
    /// `crit → 0`, `warn → 1`, `info → 2`.
    pub fn rank(self) -> u8 {
        match self {
            Self::Crit => 0,
            Self::Warn => 1,
            Self::Info => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crit => "crit",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }

    /// The more severe of two severities.
    pub fn most_severe(self, other: Self) -> Self {
        self.min(other)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crit" => Ok(Self::Crit),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "unknown severity `{other}` (expected crit, warn, or info)"
            )),
        }
    }
}

/// Atom kinds. Variant order matches the lexicographic order of the labels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AtomType {
    GateFlip,
    GateMetricTension,
    GateOverlayTension,
    MetricDelta,
    OverlayChange,
}

impl AtomType {
    pub const ALL: [AtomType; 5] = [
        Self::GateFlip,
        Self::GateMetricTension,
        Self::GateOverlayTension,
        Self::MetricDelta,
        Self::OverlayChange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GateFlip => "gate_flip",
            Self::GateMetricTension => "gate_metric_tension",
            Self::GateOverlayTension => "gate_overlay_tension",
            Self::MetricDelta => "metric_delta",
            Self::OverlayChange => "overlay_change",
        }
    }

    pub fn is_tension(self) -> bool {
        matches!(self, Self::GateMetricTension | Self::GateOverlayTension)
    }

    /// Whether atoms of this type must carry `evidence.source.row_index`.
    pub fn requires_row_provenance(self) -> bool {
        matches!(self, Self::GateFlip | Self::MetricDelta)
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown atom type `{s}`"))
    }
}

/// Row in the comparison dataset an atom was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSource {
    pub row_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl RowSource {
    pub fn row(table: &str, row_index: usize) -> Self {
        Self {
            row_index: row_index as u64,
            table: Some(table.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateFlipEvidence {
    pub source: RowSource,
    pub gate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub baseline: bool,
    pub candidate: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GateFlipEvidence {
    /// Pass in the baseline, fail in the candidate.
    pub fn is_regression(&self) -> bool {
        self.baseline && !self.candidate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDeltaEvidence {
    pub source: RowSource,
    pub metric_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub baseline: f64,
    pub candidate: f64,
    pub delta: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayChangeEvidence {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default)]
    pub baseline: Value,
    #[serde(default)]
    pub candidate: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateMetricTensionEvidence {
    pub gate_atom_id: AtomId,
    pub metric_atom_id: AtomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOverlayTensionEvidence {
    pub gate_atom_id: AtomId,
    pub overlay_atom_id: AtomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Type tag and evidence of an atom, as one value.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomBody {
    GateFlip(GateFlipEvidence),
    MetricDelta(MetricDeltaEvidence),
    OverlayChange(OverlayChangeEvidence),
    GateOverlayTension(GateOverlayTensionEvidence),
    GateMetricTension(GateMetricTensionEvidence),
}

impl AtomBody {
    pub fn atom_type(&self) -> AtomType {
        match self {
            Self::GateFlip(_) => AtomType::GateFlip,
            Self::MetricDelta(_) => AtomType::MetricDelta,
            Self::OverlayChange(_) => AtomType::OverlayChange,
            Self::GateOverlayTension(_) => AtomType::GateOverlayTension,
            Self::GateMetricTension(_) => AtomType::GateMetricTension,
        }
    }

    fn evidence_value(&self) -> Value {
        let value = match self {
            Self::GateFlip(ev) => serde_json::to_value(ev),
            Self::MetricDelta(ev) => serde_json::to_value(ev),
            Self::OverlayChange(ev) => serde_json::to_value(ev),
            Self::GateOverlayTension(ev) => serde_json::to_value(ev),
            Self::GateMetricTension(ev) => serde_json::to_value(ev),
        };
        value.expect("atom evidence must serialize")
    }

    fn from_evidence(atom_type: AtomType, evidence: Value) -> Result<Self, serde_json::Error> {
        Ok(match atom_type {
            AtomType::GateFlip => Self::GateFlip(serde_json::from_value(evidence)?),
            AtomType::MetricDelta => Self::MetricDelta(serde_json::from_value(evidence)?),
            AtomType::OverlayChange => Self::OverlayChange(serde_json::from_value(evidence)?),
            AtomType::GateOverlayTension => {
                Self::GateOverlayTension(serde_json::from_value(evidence)?)
            }
            AtomType::GateMetricTension => {
                Self::GateMetricTension(serde_json::from_value(evidence)?)
            }
        })
    }
}

/// An immutable fact in a paradox field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AtomWire", into = "AtomWire")]
pub struct Atom {
    pub atom_id: AtomId,
    pub severity: Severity,
    pub title: String,
    pub body: AtomBody,
    /// Only set on atoms inside a core projection.
    pub core_rank: Option<u32>,
    /// Top-level keys this model does not interpret, kept verbatim.
    pub extra: Map<String, Value>,
}

impl Atom {
    pub fn new(
        atom_id: AtomId,
        severity: Severity,
        title: impl Into<String>,
        body: AtomBody,
    ) -> Self {
        Self {
            atom_id,
            severity,
            title: title.into(),
            body,
            core_rank: None,
            extra: Map::new(),
        }
    }

    pub fn atom_type(&self) -> AtomType {
        self.body.atom_type()
    }

    /// `(gate_atom_id, linked_atom_id)` for tension atoms.
    pub fn tension_links(&self) -> Option<(&AtomId, &AtomId)> {
        match &self.body {
            AtomBody::GateMetricTension(ev) => Some((&ev.gate_atom_id, &ev.metric_atom_id)),
            AtomBody::GateOverlayTension(ev) => Some((&ev.gate_atom_id, &ev.overlay_atom_id)),
            _ => None,
        }
    }

    pub fn row_index(&self) -> Option<u64> {
        match &self.body {
            AtomBody::GateFlip(ev) => Some(ev.source.row_index),
            AtomBody::MetricDelta(ev) => Some(ev.source.row_index),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AtomWire {
    atom_id: AtomId,
    #[serde(rename = "type")]
    atom_type: AtomType,
    severity: Severity,
    title: String,
    evidence: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    core_rank: Option<u32>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<AtomWire> for Atom {
    type Error = String;

    fn try_from(wire: AtomWire) -> Result<Self, Self::Error> {
        let body = AtomBody::from_evidence(wire.atom_type, wire.evidence).map_err(|e| {
            format!(
                "atom `{}` has evidence that does not fit type `{}`: {e}",
                wire.atom_id, wire.atom_type
            )
        })?;
        Ok(Self {
            atom_id: wire.atom_id,
            severity: wire.severity,
            title: wire.title,
            body,
            core_rank: wire.core_rank,
            extra: wire.extra,
        })
    }
}

impl From<Atom> for AtomWire {
    fn from(atom: Atom) -> Self {
        Self {
            atom_type: atom.atom_type(),
            evidence: atom.body.evidence_value(),
            atom_id: atom.atom_id,
            severity: atom.severity,
            title: atom.title,
            core_rank: atom.core_rank,
            extra: atom.extra,
        }
    }
}

/// Deterministic atom id from its type and identifying key.
pub fn atom_id_for(atom_type: AtomType, key: &str) -> AtomId {
    AtomId(format!(
        "atom1_{}",
        short_digest(&json!({ "type": atom_type.as_str(), "key": key }))
    ))
}
