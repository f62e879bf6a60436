//! Typed view of a CSVW table group metadata document.
//!
//! Only the structure needed to build tables is typed. Annotations whose
//! validation needs descriptive errors (`datatype`, `dialect`) stay raw JSON
//! and are checked by [`crate::datatype::Datatype`] and
//! [`crate::table::Dialect`]. Everything else is kept in `properties`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConstructionResult;

/// A string or a list of strings, as used by `primaryKey`, `columnReference` and `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// The whole metadata document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableGroupDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Value>,

    #[serde(default)]
    pub tables: Vec<TableDescription>,

    /// Dataset-level annotations (`dc:title`, `@context`, ...)
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl TableGroupDescription {
    pub fn from_path(path: &Path) -> ConstructionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> ConstructionResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDescription {
    /// Path of the backing CSV file, relative to the metadata document.
    pub url: String,

    #[serde(rename = "dc:conformsTo", default, skip_serializing_if = "Option::is_none")]
    pub conforms_to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Value>,

    #[serde(rename = "tableSchema", default)]
    pub table_schema: SchemaDescription,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDescription {
    #[serde(default)]
    pub columns: Vec<ColumnDescription>,

    #[serde(rename = "foreignKeys", default)]
    pub foreign_keys: Vec<ForeignKeyDescription>,

    #[serde(rename = "primaryKey", default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<OneOrMany>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "propertyUrl", default, skip_serializing_if = "Option::is_none")]
    pub property_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Value>,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescription {
    #[serde(rename = "columnReference")]
    pub column_reference: OneOrMany,
    pub reference: ReferenceDescription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// URL of the referenced table.
    pub resource: String,
    #[serde(rename = "columnReference")]
    pub column_reference: OneOrMany,
}
