//! The paradox field document: `{ "paradox_field_v0": { meta, atoms } }`.

use crate::atom::Atom;
use crate::canonical::{content_digest, sort_atoms, to_canonical_value};
use crate::edge::RunContext;
use crate::error::ParadoxError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

pub const FIELD_WRAPPER_KEY: &str = "paradox_field_v0";
pub const FIELD_SCHEMA: &str = "PULSE_paradox_field_v0";
pub const FIELD_VERSION: &str = "v0";

const DOCUMENT: &str = "field";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub schema: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_context: Option<RunContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atom_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_digest: Option<String>,
    /// Opt-in wall-clock stamp; never part of `field_digest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_utc: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldMeta {
    /// Bare meta carrying only the schema tags.
    pub fn empty() -> Self {
        Self {
            schema: FIELD_SCHEMA.to_string(),
            version: FIELD_VERSION.to_string(),
            run_context: None,
            rules: Vec::new(),
            atom_count: None,
            field_digest: None,
            created_at_utc: None,
            extra: Map::new(),
        }
    }
}

/// A full paradox field. Atoms are held in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub meta: Option<FieldMeta>,
    pub atoms: Vec<Atom>,
    /// Digest of the atoms exactly as they were read, when parsed from JSON.
    read_digest: Option<String>,
}

impl Field {
    /// Build a field, imposing canonical atom order.
    pub fn new(meta: Option<FieldMeta>, mut atoms: Vec<Atom>) -> Self {
        sort_atoms(&mut atoms);
        Self {
            meta,
            atoms,
            read_digest: None,
        }
    }

    /// Build a field whose meta records the run context, rule names, atom
    /// count, and content digest.
    pub fn sealed(
        atoms: Vec<Atom>,
        run_context: RunContext,
        rules: Vec<String>,
    ) -> Result<Self, ParadoxError> {
        let mut field = Self::new(None, atoms);
        let digest = field_digest(&field.atoms, Some(&run_context))?;
        field.meta = Some(FieldMeta {
            run_context: Some(run_context),
            rules,
            atom_count: Some(field.atoms.len()),
            field_digest: Some(digest),
            ..FieldMeta::empty()
        });
        Ok(field)
    }

    pub fn run_context(&self) -> Option<&RunContext> {
        self.meta.as_ref().and_then(|meta| meta.run_context.as_ref())
    }

    /// Stamp `meta.created_at_utc`. Leaves the content digest untouched.
    pub fn stamp_created_at(&mut self, created_at_utc: String) {
        self.meta
            .get_or_insert_with(FieldMeta::empty)
            .created_at_utc = Some(created_at_utc);
    }

    /// Parse either the wrapped form or the legacy top-level `atoms` form.
    ///
    /// The wrapped form must carry `meta` with exact schema/version tags.
    pub fn from_value(value: Value) -> Result<Self, ParadoxError> {
        let Value::Object(mut root) = value else {
            return Err(ParadoxError::malformed(DOCUMENT, "expected a JSON object"));
        };

        let (body, wrapped) = match root.remove(FIELD_WRAPPER_KEY) {
            Some(Value::Object(inner)) => (inner, true),
            Some(_) => {
                return Err(ParadoxError::malformed(
                    DOCUMENT,
                    format!("`{FIELD_WRAPPER_KEY}` must be an object"),
                ));
            }
            None => (root, false),
        };

        let meta = match body.get("meta") {
            Some(raw) => Some(parse_meta(raw.clone())?),
            None if wrapped => {
                return Err(ParadoxError::malformed(
                    DOCUMENT,
                    format!("`{FIELD_WRAPPER_KEY}.meta` is required"),
                ));
            }
            None => None,
        };

        let atoms_raw = match body.get("atoms") {
            Some(Value::Array(items)) => Value::Array(items.clone()),
            Some(_) => return Err(ParadoxError::malformed(DOCUMENT, "`atoms` must be an array")),
            None => return Err(ParadoxError::malformed(DOCUMENT, "missing `atoms`")),
        };
        let run_context_raw = body
            .get("meta")
            .and_then(|meta| meta.get("run_context"))
            .cloned()
            .unwrap_or(Value::Null);
        let read_digest = content_digest(
            "field1",
            &json!({ "atoms": atoms_raw, "run_context": run_context_raw }),
        );
        let atoms: Vec<Atom> =
            serde_json::from_value(atoms_raw).map_err(|source| ParadoxError::Json {
                document: DOCUMENT.to_string(),
                source,
            })?;

        let mut field = Self::new(meta, atoms);
        field.read_digest = Some(read_digest);
        Ok(field)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ParadoxError> {
        let value: Value = serde_json::from_str(text).map_err(|source| ParadoxError::Json {
            document: DOCUMENT.to_string(),
            source,
        })?;
        Self::from_value(value)
    }

    /// Always the wrapped form.
    pub fn to_value(&self) -> Result<Value, ParadoxError> {
        let meta = self.meta.clone().unwrap_or_else(FieldMeta::empty);
        Ok(json!({
            FIELD_WRAPPER_KEY: {
                "meta": to_canonical_value(DOCUMENT, &meta)?,
                "atoms": to_canonical_value(DOCUMENT, &self.atoms)?,
            }
        }))
    }

    /// Content digest of this field.
    ///
    /// A parsed field reports the digest of the atom JSON it was read from,
    /// so it agrees byte for byte with an independent check of that file.
    /// A field built in memory is digested from its typed atoms.
    pub fn content_digest(&self) -> Result<String, ParadoxError> {
        match &self.read_digest {
            Some(digest) => Ok(digest.clone()),
            None => field_digest(&self.atoms, self.run_context()),
        }
    }

    /// `atom_id → position`, failing on duplicate ids.
    pub fn atom_index(&self) -> Result<HashMap<&str, usize>, ParadoxError> {
        let mut index = HashMap::with_capacity(self.atoms.len());
        for (pos, atom) in self.atoms.iter().enumerate() {
            if index.insert(atom.atom_id.as_str(), pos).is_some() {
                return Err(ParadoxError::DuplicateId {
                    kind: "atom",
                    id: atom.atom_id.to_string(),
                });
            }
        }
        Ok(index)
    }
}

fn parse_meta(raw: Value) -> Result<FieldMeta, ParadoxError> {
    let meta: FieldMeta = serde_json::from_value(raw).map_err(|source| ParadoxError::Json {
        document: "field meta".to_string(),
        source,
    })?;
    if meta.schema != FIELD_SCHEMA {
        return Err(ParadoxError::malformed(
            DOCUMENT,
            format!(
                "meta.schema is `{}`, expected `{FIELD_SCHEMA}`",
                meta.schema
            ),
        ));
    }
    if meta.version != FIELD_VERSION {
        return Err(ParadoxError::malformed(
            DOCUMENT,
            format!(
                "meta.version is `{}`, expected `{FIELD_VERSION}`",
                meta.version
            ),
        ));
    }
    Ok(meta)
}

/// `field1_<sha256>` over the canonical bytes of `{atoms, run_context}`.
pub fn field_digest(
    atoms: &[Atom],
    run_context: Option<&RunContext>,
) -> Result<String, ParadoxError> {
    let material = json!({
        "atoms": to_canonical_value(DOCUMENT, &atoms)?,
        "run_context": to_canonical_value(DOCUMENT, &run_context)?,
    });
    Ok(content_digest("field1", &material))
}
