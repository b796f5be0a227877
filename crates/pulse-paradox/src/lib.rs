//! # PULSE paradox
//!
//! Typed evidence graph between two pipeline runs, and the deterministic
//! core projection drawn from it.
//!
//! ```text
//! RunComparison        ← baseline/candidate gates, metrics, overlays
//!     │ build_field
//! Field + Vec<Edge>    ← atoms (flips, deltas, changes, tensions) and links
//!     │ project_core
//! Core                 ← top-k atoms, internal edges, positional mirrors
//! ```
//!
//! Every document is rendered through [`canonical`], so identical inputs
//! produce identical bytes.

pub mod atom;
pub mod canonical;
pub mod config;
pub mod edge;
pub mod error;
pub mod field;
pub mod jsonl;
pub mod linker;
pub mod projector;

pub use atom::{Atom, AtomBody, AtomId, AtomType, RowSource, Severity};
pub use canonical::{canonical_json_bytes, content_digest, render_canonical, render_jsonl};
pub use config::{LinkerConfig, Thresholds};
pub use edge::{Edge, RunContext};
pub use error::ParadoxError;
pub use field::{FIELD_SCHEMA, FIELD_VERSION, FIELD_WRAPPER_KEY, Field, FieldMeta, field_digest};
pub use jsonl::{JsonlError, read_edges, read_edges_from_path, write_atomic, write_atomic_all};
pub use linker::{FieldBuild, LinkRule, RunComparison, build_field};
pub use projector::{
    CORE_SCHEMA, CORE_VERSION, Core, CoreIndex, CoreMeta, DEFAULT_K, EdgePolicy, ProjectOptions,
    Selection, SelectionMethod, SelectionMetric, TieBreak, project_core,
};
