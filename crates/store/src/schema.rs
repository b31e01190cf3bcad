//! Structural schema validation for ledger documents.
//!
//! Schemas are JSON Schema (draft 7) documents. The built-in schema is
//! compiled into the binary; a file-based schema can replace it through
//! the store config. Violations carry the JSON pointer of the offending
//! node, `/` for the document root.

use std::fmt;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::StoreError;

/// Schema shipped with the store, matching [`crate::StoreVersion::CURRENT`].
pub const BUILTIN_SCHEMA: &str = include_str!("../schema/ledger-1.0.schema.json");

pub struct Schema {
    compiled: JSONSchema,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").finish_non_exhaustive()
    }
}

impl Schema {
    pub fn builtin() -> Result<Self, StoreError> {
        Self::parse(BUILTIN_SCHEMA)
    }

    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::ResourceNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| StoreError::Parse(format!("schema: {e}")))?;
        let compiled = JSONSchema::compile(&root)
            .map_err(|e| StoreError::schema("#", format!("invalid schema: {e}")))?;
        Ok(Self { compiled })
    }

    /// First violation wins; the message counts the rest.
    pub fn validate(&self, doc: &Value) -> Result<(), StoreError> {
        let Err(errors) = self.compiled.validate(doc) else {
            return Ok(());
        };
        let violations: Vec<(String, String)> = errors
            .map(|e| (e.instance_path.to_string(), e.to_string()))
            .collect();
        let Some((path, message)) = violations.first() else {
            return Ok(());
        };
        let path = if path.is_empty() { "/".to_string() } else { path.clone() };
        let message = match violations.len() {
            1 => message.clone(),
            n => format!("{message} (and {} more)", n - 1),
        };
        Err(StoreError::schema(path, message))
    }
}
