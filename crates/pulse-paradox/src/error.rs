//! Error types for paradox field construction and projection.

use crate::jsonl::JsonlError;

/// Errors raised while building, reading, or projecting a paradox field.
#[derive(Debug, thiserror::Error)]
pub enum ParadoxError {
    /// The document is missing a required key or has the wrong shape.
    #[error("malformed {document}: {message}")]
    Malformed { document: String, message: String },

    /// A JSON payload failed to parse into the typed model.
    #[error("invalid json in {document}: {source}")]
    Json {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    /// A numeric input is NaN or infinite.
    #[error("non-finite value at {path}")]
    NonFinite { path: String },

    /// Two atoms or two edges share an identifier.
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },

    /// An edge endpoint does not resolve to an atom of the field.
    #[error("edge `{edge_id}` references unknown atom `{atom_id}` ({endpoint})")]
    DanglingEdge {
        edge_id: String,
        endpoint: &'static str,
        atom_id: String,
    },

    /// Selection parameters are unusable (`k < 1`, unknown metric, ...).
    #[error("invalid selection: {0}")]
    Selection(String),

    /// The projection would leave an edge pointing outside the core.
    #[error("edge `{edge_id}` crosses the core boundary under edge_policy=fail_on_external")]
    ExternalEdge { edge_id: String },

    /// Linker configuration is inconsistent.
    #[error("invalid linker config: {0}")]
    Config(String),

    /// Edge JSONL I/O failure.
    #[error(transparent)]
    Jsonl(#[from] JsonlError),
}

impl ParadoxError {
    pub(crate) fn malformed(document: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            document: document.to_string(),
            message: message.into(),
        }
    }

    /// Stable failure class used in CLI diagnostics.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Malformed { .. } | Self::Json { .. } => "paradox.input_invalid",
            Self::NonFinite { .. } => "paradox.non_finite",
            Self::DuplicateId { .. } => "paradox.duplicate_id",
            Self::DanglingEdge { .. } => "paradox.dangling_edge",
            Self::Selection(_) => "paradox.selection_invalid",
            Self::ExternalEdge { .. } => "paradox.external_edge",
            Self::Config(_) => "paradox.config_invalid",
            Self::Jsonl(_) => "paradox.edges_invalid",
        }
    }
}
