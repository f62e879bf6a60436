//! Columns: naming, null tokens and list-valued cells.

use crate::datatype::{Cell, Datatype, StorageValue};
use crate::error::{ConstructionResult, ValueResult};
use crate::metadata::ColumnDescription;

/// Columns whose `propertyUrl` lives here get a `cldf_` canonical name.
pub const CLDF_TERMS: &str = "http://cldf.clld.org";

/// A column of a table schema.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    /// Name used for row keys and SQL columns.
    pub canonical_name: String,
    pub datatype: Datatype,
    /// Set for list-valued columns.
    pub separator: Option<String>,
    pub null: Vec<String>,
}

impl Column {
    /// Build the column at position `index` (0-based) of a schema.
    pub fn new(index: usize, description: &ColumnDescription) -> ConstructionResult<Self> {
        let name = description
            .name
            .clone()
            .unwrap_or_else(|| format!("Col_{}", index + 1));
        let canonical_name = match &description.property_url {
            Some(url) if url.starts_with(CLDF_TERMS) => {
                let term = url.rsplit_once('#').map_or(url.as_str(), |(_, term)| term);
                format!("cldf_{}", term)
            }
            _ => name.clone(),
        };
        let null = description
            .null
            .as_ref()
            .map(|n| n.to_vec())
            .unwrap_or_else(|| vec![String::new()]);
        Ok(Self {
            name,
            canonical_name,
            datatype: Datatype::new(description.datatype.as_ref())?,
            separator: description.separator.clone().filter(|s| !s.is_empty()),
            null,
        })
    }

    pub fn is_list_valued(&self) -> bool {
        self.separator.is_some()
    }

    /// Decode a cell. List-valued columns are only split when `split` is set.
    pub fn decode(&self, text: &str, split: bool, enforce: bool) -> ValueResult<Cell> {
        if self.null.iter().any(|n| n == text) {
            return Ok(match (&self.separator, split) {
                (Some(_), true) => Cell::List(Vec::new()),
                _ => Cell::Absent,
            });
        }
        match (&self.separator, split) {
            (Some(sep), true) => text
                .split(sep.as_str())
                .map(|piece| self.datatype.parse(piece, enforce))
                .collect::<ValueResult<Vec<_>>>()
                .map(Cell::List),
            _ => self.datatype.parse(text, enforce).map(Cell::Scalar),
        }
    }

    /// Inverse of [`Column::decode`].
    pub fn format_cell(&self, cell: &Cell) -> ValueResult<String> {
        match cell {
            Cell::Absent => Ok(self.null.first().cloned().unwrap_or_default()),
            Cell::Scalar(value) => self.datatype.format(value),
            Cell::List(values) => {
                let pieces = values
                    .iter()
                    .map(|v| self.datatype.format(v))
                    .collect::<ValueResult<Vec<_>>>()?;
                Ok(pieces.join(self.separator.as_deref().unwrap_or(" ")))
            }
        }
    }

    /// Storage value of a cell. List cells are written back as separated text.
    pub fn to_storage(&self, cell: &Cell) -> ValueResult<StorageValue> {
        match cell {
            Cell::Absent => Ok(StorageValue::Null),
            Cell::Scalar(value) => Ok(self.datatype.to_storage(Some(value))),
            Cell::List(_) => self.format_cell(cell).map(StorageValue::Text),
        }
    }

    /// Column definition for `CREATE TABLE`, with CHECK constraints when enforcing.
    pub fn sql_definition(&self, enforce: bool) -> String {
        let mut res = format!(
            "`{}`\t{}",
            self.canonical_name,
            self.datatype.storage_kind()
        );
        // List cells are stored joined, so value checks would not apply.
        if enforce && !self.is_list_valued() {
            let checks = self.datatype.sql_constraints(&self.canonical_name);
            if !checks.is_empty() {
                res.push_str(&format!(" CHECK({})", checks.join(" AND ")));
            }
        }
        res
    }
}
