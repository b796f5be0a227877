//! Core projection: a bounded, self-describing top-k view of a field.
//!
//! `project_core` is a pure function of (field, edges, selection). The
//! selection parameters are written into the output so the projection can be
//! reproduced without re-deriving defaults.

use crate::atom::{Atom, AtomId};
use crate::canonical::{atom_order_key, render_canonical, sort_edges};
use crate::edge::{Edge, RunContext};
use crate::error::ParadoxError;
use crate::field::Field;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const CORE_SCHEMA: &str = "PULSE_paradox_core_v0";
pub const CORE_VERSION: &str = "v0";
pub const DEFAULT_K: usize = 12;

const DOCUMENT: &str = "core";

macro_rules! selection_enum {
    ($name:ident, $what:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParadoxError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(ParadoxError::Selection(format!(
                        concat!("unknown ", $what, " `{}`"),
                        other
                    ))),
                }
            }
        }
    };
}

selection_enum!(SelectionMetric, "metric", { Severity => "severity" });
selection_enum!(SelectionMethod, "method", { TopK => "top_k" });
selection_enum!(TieBreak, "tie_break", { AtomId => "atom_id" });
selection_enum!(EdgePolicy, "edge_policy", {
    DropExternal => "drop_external",
    FailOnExternal => "fail_on_external",
});

/// Parameters that produced a core. Recorded verbatim in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub k: usize,
    pub metric: SelectionMetric,
    pub method: SelectionMethod,
    pub tie_break: TieBreak,
    pub edge_policy: EdgePolicy,
}

impl Selection {
    /// Default selection with the given `k`. Rejects `k < 1`.
    pub fn new(k: usize) -> Result<Self, ParadoxError> {
        let selection = Self {
            k,
            metric: SelectionMetric::default(),
            method: SelectionMethod::default(),
            tie_break: TieBreak::default(),
            edge_policy: EdgePolicy::default(),
        };
        selection.validate()?;
        Ok(selection)
    }

    /// Parse CLI-style parameters, rejecting anything unknown up front.
    pub fn parse(
        k: usize,
        metric: &str,
        tie_break: &str,
        edge_policy: &str,
    ) -> Result<Self, ParadoxError> {
        let selection = Self {
            k,
            metric: metric.parse()?,
            method: SelectionMethod::TopK,
            tie_break: tie_break.parse()?,
            edge_policy: edge_policy.parse()?,
        };
        selection.validate()?;
        Ok(selection)
    }

    pub fn validate(&self) -> Result<(), ParadoxError> {
        if self.k < 1 {
            return Err(ParadoxError::Selection(format!(
                "k must be >= 1, got {}",
                self.k
            )));
        }
        Ok(())
    }

    /// Most significant first. For `severity` this coincides with the
    /// canonical atom order, with `atom_id` as the final key.
    fn compare(&self, a: &Atom, b: &Atom) -> Ordering {
        let primary = match self.metric {
            SelectionMetric::Severity => atom_order_key(a).cmp(&atom_order_key(b)),
        };
        primary.then_with(|| match self.tie_break {
            TieBreak::AtomId => a.atom_id.cmp(&b.atom_id),
        })
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            metric: SelectionMetric::default(),
            method: SelectionMethod::default(),
            tie_break: TieBreak::default(),
            edge_policy: EdgePolicy::default(),
        }
    }
}

/// Positional mirrors of `atoms[]` and `edges[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreIndex {
    pub atom_ids: Vec<AtomId>,
    pub edge_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMeta {
    pub source_field_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_context: Option<RunContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_utc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Core {
    pub schema: String,
    pub version: String,
    pub selection: Selection,
    pub atoms: Vec<Atom>,
    pub edges: Vec<Edge>,
    pub core: CoreIndex,
    pub meta: CoreMeta,
}

impl Core {
    pub fn render(&self) -> Result<String, ParadoxError> {
        render_canonical(DOCUMENT, self)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ParadoxError> {
        let core: Self = serde_json::from_str(text).map_err(|source| ParadoxError::Json {
            document: DOCUMENT.to_string(),
            source,
        })?;
        if core.schema != CORE_SCHEMA || core.version != CORE_VERSION {
            return Err(ParadoxError::malformed(
                DOCUMENT,
                format!(
                    "schema/version `{}`/`{}`, expected `{CORE_SCHEMA}`/`{CORE_VERSION}`",
                    core.schema, core.version
                ),
            ));
        }
        core.selection.validate()?;
        Ok(core)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Recorded in `meta.created_at_utc` when set.
    pub created_at_utc: Option<String>,
}

pub fn project_core(
    field: &Field,
    edges: &[Edge],
    selection: &Selection,
    options: &ProjectOptions,
) -> Result<Core, ParadoxError> {
    selection.validate()?;
    let index = field.atom_index()?;
    let source_field_digest = field.content_digest()?;
    if let Some(recorded) = field.meta.as_ref().and_then(|m| m.field_digest.as_deref())
        && recorded != source_field_digest
    {
        return Err(ParadoxError::malformed(
            "field",
            format!(
                "meta.field_digest `{recorded}` does not match content \
                 `{source_field_digest}`"
            ),
        ));
    }
    check_edges(edges, &index)?;

    let mut ranked: Vec<&Atom> = field.atoms.iter().collect();
    ranked.sort_by(|a, b| selection.compare(a, b));

    let atoms: Vec<Atom> = ranked
        .into_iter()
        .take(selection.k)
        .enumerate()
        .map(|(pos, atom)| {
            let mut atom = atom.clone();
            atom.core_rank = Some(pos as u32 + 1);
            atom
        })
        .collect();

    let selected: HashSet<&str> = atoms.iter().map(|a| a.atom_id.as_str()).collect();
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    for edge in edges {
        let internal = selected.contains(edge.src_atom_id.as_str())
            && selected.contains(edge.dst_atom_id.as_str());
        if internal {
            kept.push(edge.clone());
            continue;
        }
        match selection.edge_policy {
            EdgePolicy::DropExternal => dropped += 1,
            EdgePolicy::FailOnExternal => {
                return Err(ParadoxError::ExternalEdge {
                    edge_id: edge.edge_id.clone(),
                });
            }
        }
    }
    sort_edges(&mut kept);

    if dropped > 0 {
        log::info!("dropped {dropped} edge(s) with an endpoint outside the top-{}", selection.k);
    }
    log::debug!(
        "projected {} of {} atom(s), kept {} edge(s)",
        atoms.len(),
        field.atoms.len(),
        kept.len()
    );

    let core = CoreIndex {
        atom_ids: atoms.iter().map(|a| a.atom_id.clone()).collect(),
        edge_ids: kept.iter().map(|e| e.edge_id.clone()).collect(),
    };
    Ok(Core {
        schema: CORE_SCHEMA.to_string(),
        version: CORE_VERSION.to_string(),
        selection: *selection,
        atoms,
        edges: kept,
        core,
        meta: CoreMeta {
            source_field_digest,
            run_context: field.run_context().cloned(),
            created_at_utc: options.created_at_utc.clone(),
        },
    })
}

fn check_edges(edges: &[Edge], index: &HashMap<&str, usize>) -> Result<(), ParadoxError> {
    let mut seen = HashSet::with_capacity(edges.len());
    for edge in edges {
        if !seen.insert(edge.edge_id.as_str()) {
            return Err(ParadoxError::DuplicateId {
                kind: "edge",
                id: edge.edge_id.clone(),
            });
        }
        if !edge.edge_type.is_tension() {
            return Err(ParadoxError::malformed(
                "edges",
                format!(
                    "edge `{}` has type `{}`, expected a tension type",
                    edge.edge_id, edge.edge_type
                ),
            ));
        }
        for (endpoint, atom_id) in [
            ("src_atom_id", &edge.src_atom_id),
            ("dst_atom_id", &edge.dst_atom_id),
        ] {
            if !index.contains_key(atom_id.as_str()) {
                return Err(ParadoxError::DanglingEdge {
                    edge_id: edge.edge_id.clone(),
                    endpoint,
                    atom_id: atom_id.to_string(),
                });
            }
        }
    }
    Ok(())
}
