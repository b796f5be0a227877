//! # PULSE contract
//!
//! Independent, fail-closed validation of paradox fields, edge sets, and
//! cores. Works on parsed JSON only and re-derives every invariant itself:
//!
//! - schema and version tags match exactly;
//! - atom and edge ids are unique;
//! - atoms and edges sit in canonical order (first out-of-order pair reported);
//! - tension links resolve to atoms of the required type;
//! - edge endpoints resolve within the same document;
//! - `gate_flip` and `metric_delta` atoms carry `evidence.source.row_index`;
//! - core ranks run `1..N` and `core.atom_ids`/`core.edge_ids` mirror the arrays.
//!
//! The first violation found is returned; nothing is repaired.

mod access;
pub mod arena;
pub mod edges;
pub mod field;
pub mod projection;
pub mod violation;

use serde::{Deserialize, Serialize};

pub use arena::{AtomArena, AtomView, Scope};
pub use edges::{EdgeView, validate_edges};
pub use field::validate_field;
pub use projection::validate_core;
pub use violation::ContractViolation;

pub const DOCUMENT_FIELD: &str = "field";
pub const DOCUMENT_CORE: &str = "core";

/// Counts reported for a document that passed validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    pub document: String,
    pub atom_count: usize,
    pub tension_count: usize,
    pub edge_count: usize,
    pub run_pair_id: Option<String>,
}
