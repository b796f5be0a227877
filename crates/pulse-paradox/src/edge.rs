//! Edges: directed associations between atoms, justified by a tension atom.

use crate::atom::{AtomId, AtomType, Severity};
use crate::canonical::{content_digest, short_digest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

pub const RUN_PAIR_ID_KEY: &str = "run_pair_id";

/// Fingerprint of the inputs a field was derived from.
///
/// Always carries `run_pair_id`; every other entry is a content digest keyed
/// by the input it covers (`comparison_sha256`, `overlay_sha256`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct RunContext {
    entries: BTreeMap<String, String>,
}

impl RunContext {
    pub fn new(run_pair_id: impl Into<String>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(RUN_PAIR_ID_KEY.to_string(), run_pair_id.into());
        Self { entries }
    }

    /// Record a digest. `run_pair_id` cannot be overwritten this way.
    pub fn with_digest(mut self, key: impl Into<String>, digest: impl Into<String>) -> Self {
        let key = key.into();
        if key != RUN_PAIR_ID_KEY {
            self.entries.insert(key, digest.into());
        }
        self
    }

    pub fn run_pair_id(&self) -> &str {
        self.entries
            .get(RUN_PAIR_ID_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl TryFrom<BTreeMap<String, String>> for RunContext {
    type Error = String;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        match entries.get(RUN_PAIR_ID_KEY) {
            Some(id) if !id.trim().is_empty() => Ok(Self { entries }),
            _ => Err(format!("run_context is missing a non-empty `{RUN_PAIR_ID_KEY}`")),
        }
    }
}

impl From<RunContext> for BTreeMap<String, String> {
    fn from(ctx: RunContext) -> Self {
        ctx.entries
    }
}

/// Fingerprint of an ordered (baseline, candidate) run pair.
pub fn run_pair_id_for(baseline_run_id: &str, candidate_run_id: &str) -> String {
    content_digest(
        "pair1",
        &json!({
            "baseline_run_id": baseline_run_id,
            "candidate_run_id": candidate_run_id,
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub edge_id: String,
    #[serde(rename = "type")]
    pub edge_type: AtomType,
    pub src_atom_id: AtomId,
    pub dst_atom_id: AtomId,
    pub severity: Severity,
    pub tension_atom_id: AtomId,
    pub rule: String,
    pub run_context: RunContext,
}

/// Deterministic edge id from its type, endpoints, and justifying tension.
pub fn edge_id_for(
    edge_type: AtomType,
    src: &AtomId,
    dst: &AtomId,
    tension_atom_id: &AtomId,
) -> String {
    format!(
        "edge1_{}",
        short_digest(&json!({
            "type": edge_type.as_str(),
            "src_atom_id": src.as_str(),
            "dst_atom_id": dst.as_str(),
            "tension_atom_id": tension_atom_id.as_str(),
        }))
    )
}
