//! Structured contract violations.

/// A single invariant violation. Validation stops at the first one found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("missing required key `{path}`")]
    MissingKey { path: String },

    #[error("`{path}` is `{actual}`, expected `{expected}`")]
    SchemaMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("invalid value at `{path}`: {message}")]
    InvalidValue { path: String, message: String },

    #[error("duplicate atom_id `{atom_id}`")]
    DuplicateAtomId { atom_id: String },

    #[error("duplicate edge_id `{edge_id}`")]
    DuplicateEdgeId { edge_id: String },

    #[error("atom `{atom_id}` at position {position} has core_rank {actual}, expected {expected}")]
    RankViolation {
        atom_id: String,
        position: usize,
        expected: usize,
        actual: String,
    },

    #[error("{collection} out of canonical order at index {index}: `{previous}` precedes `{current}`")]
    OrderingViolation {
        collection: &'static str,
        index: usize,
        previous: String,
        current: String,
    },

    #[error("tension atom `{atom_id}` links `{target}` via evidence.{link}, which does not exist")]
    DanglingLink {
        atom_id: String,
        link: &'static str,
        target: String,
    },

    #[error(
        "tension atom `{atom_id}` links `{target}` via evidence.{link}: type is `{actual}`, expected `{expected}`"
    )]
    LinkTypeMismatch {
        atom_id: String,
        link: &'static str,
        target: String,
        expected: &'static str,
        actual: String,
    },

    #[error("edge `{edge_id}` {endpoint} `{atom_id}` does not resolve to an atom in the {scope}")]
    DanglingEdgeEndpoint {
        edge_id: String,
        endpoint: &'static str,
        atom_id: String,
        scope: &'static str,
    },

    #[error("edge `{edge_id}` disagrees with its tension atom: {message}")]
    EdgeTensionMismatch { edge_id: String, message: String },

    #[error("`{index}[{position}]` is `{actual}`, expected `{expected}`")]
    IndexMismatch {
        index: &'static str,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("atom `{atom_id}` ({atom_type}) lacks integer evidence.source.row_index >= 0")]
    MissingProvenance { atom_id: String, atom_type: String },

    #[error("recorded digest `{recorded}` does not match derived `{derived}`")]
    DigestMismatch { recorded: String, derived: String },

    #[error("invalid selection: {message}")]
    SelectionInvalid { message: String },
}

impl ContractViolation {
    /// Stable class string for diagnostics and machine reports.
    pub fn class(&self) -> &'static str {
        match self {
            Self::MissingKey { .. } => "paradox_contract.missing_key",
            Self::SchemaMismatch { .. } => "paradox_contract.schema_mismatch",
            Self::InvalidValue { .. } => "paradox_contract.invalid_value",
            Self::DuplicateAtomId { .. } => "paradox_contract.duplicate_atom_id",
            Self::DuplicateEdgeId { .. } => "paradox_contract.duplicate_edge_id",
            Self::RankViolation { .. } => "paradox_contract.rank_violation",
            Self::OrderingViolation { .. } => "paradox_contract.ordering_violation",
            Self::DanglingLink { .. } => "paradox_contract.dangling_link",
            Self::LinkTypeMismatch { .. } => "paradox_contract.link_type_mismatch",
            Self::DanglingEdgeEndpoint { .. } => "paradox_contract.dangling_edge_endpoint",
            Self::EdgeTensionMismatch { .. } => "paradox_contract.edge_tension_mismatch",
            Self::IndexMismatch { .. } => "paradox_contract.index_mismatch",
            Self::MissingProvenance { .. } => "paradox_contract.missing_provenance",
            Self::DigestMismatch { .. } => "paradox_contract.digest_mismatch",
            Self::SelectionInvalid { .. } => "paradox_contract.selection_invalid",
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }
}
