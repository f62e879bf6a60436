//! Tables of a table group.
//!
//! - [`Table`] - columns, keys and (once loaded) the decoded rows
//! - [`dialect`] - CSV dialect descriptions
//! - `reader` - decoding the backing CSV file into rows
//! - `sql` - DDL and storage tuples for one table and its association tables

pub mod dialect;
mod reader;
mod sql;

use std::collections::HashMap;

use crate::column::Column;
use crate::datatype::Cell;
use crate::error::{ConstructionError, ConstructionResult};
use crate::metadata::TableDescription;

pub use dialect::{Dialect, Trim};

/// Virtual table that list-valued source references point to.
pub const SOURCE_TABLE: &str = "SourceTable";

/// Primary key of [`SOURCE_TABLE`].
pub const SOURCE_TABLE_KEY: &str = "id";

/// Canonical name of the column holding source references.
pub const SOURCE_COLUMN: &str = "cldf_source";

/// A decoded row, keyed by canonical column name.
pub type Row = HashMap<String, Cell>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// URL (or canonical name) of the referenced table.
    pub resource: String,
    pub column_reference: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column_reference: Vec<String>,
    pub reference: Reference,
    /// Single list-valued local column. Stored as an association table.
    pub many_to_many: bool,
}

impl ForeignKey {
    /// Whether the target is [`SOURCE_TABLE`], which is not part of the table group.
    pub fn is_virtual(&self) -> bool {
        self.reference.resource == SOURCE_TABLE
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub url: String,
    /// The `dc:conformsTo` property, if any.
    pub conforms_to: Option<String>,
    pub canonical_name: String,
    pub columns: Vec<Column>,
    /// Column names, as given in the metadata.
    pub primary_key: Vec<String>,
    /// Overrides the table group dialect.
    pub dialect: Option<Dialect>,
    pub foreign_keys: Vec<ForeignKey>,
    rows: Vec<Row>,
    loaded: bool,
}

impl Table {
    /// Build a table from its description. With `source_table`, a list-valued
    /// `cldf_source` column gets a many-to-many foreign key to [`SOURCE_TABLE`].
    /// A scalar `cldf_source` stays an ordinary column.
    pub fn new(description: &TableDescription, source_table: bool) -> ConstructionResult<Self> {
        let schema = &description.table_schema;
        let columns = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| Column::new(i, c))
            .collect::<ConstructionResult<Vec<_>>>()?;

        let canonical_name = match &description.conforms_to {
            Some(term) if !term.is_empty() => term
                .rsplit_once('#')
                .map_or(term.as_str(), |(_, name)| name)
                .to_string(),
            _ => description.url.clone(),
        };

        let mut foreign_keys = Vec::new();
        if source_table
            && columns
                .iter()
                .any(|c| c.canonical_name == SOURCE_COLUMN && c.is_list_valued())
        {
            foreign_keys.push(ForeignKey {
                column_reference: vec![SOURCE_COLUMN.to_string()],
                reference: Reference {
                    resource: SOURCE_TABLE.to_string(),
                    column_reference: vec![SOURCE_TABLE_KEY.to_string()],
                },
                many_to_many: true,
            });
        }

        let mut table = Self {
            url: description.url.clone(),
            conforms_to: description.conforms_to.clone(),
            canonical_name,
            columns,
            primary_key: schema
                .primary_key
                .as_ref()
                .map(|pk| pk.to_vec())
                .unwrap_or_default(),
            dialect: description
                .dialect
                .as_ref()
                .map(|d| Dialect::from_json(Some(d)))
                .transpose()?,
            foreign_keys: Vec::new(),
            rows: Vec::new(),
            loaded: false,
        };

        for fk in &schema.foreign_keys {
            let column_reference = fk.column_reference.to_vec();
            let many_to_many = match column_reference.as_slice() {
                [single] => table.column(single).is_some_and(Column::is_list_valued),
                _ => false,
            };
            foreign_keys.push(ForeignKey {
                column_reference,
                reference: Reference {
                    resource: fk.reference.resource.clone(),
                    column_reference: fk.reference.column_reference.to_vec(),
                },
                many_to_many,
            });
        }
        table.foreign_keys = foreign_keys;

        for name in table
            .primary_key
            .iter()
            .chain(table.foreign_keys.iter().flat_map(|fk| &fk.column_reference))
        {
            if table.column(name).is_none() {
                return Err(ConstructionError::UnknownColumn {
                    table: table.url.clone(),
                    column: name.clone(),
                });
            }
        }
        Ok(table)
    }

    /// Look up a column by name, then by canonical name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.canonical_name == name))
    }

    /// The first primary key column, which identifies rows in association tables.
    pub fn key_column(&self) -> Option<&Column> {
        self.primary_key.first().and_then(|name| self.column(name))
    }

    pub fn many_to_many(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter().filter(|fk| fk.many_to_many)
    }

    /// Resources this table must be created after: foreign key targets other
    /// than itself and the virtual source table.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut res: Vec<&str> = Vec::new();
        for fk in &self.foreign_keys {
            let resource = fk.reference.resource.as_str();
            if fk.is_virtual() || self.is_named(resource) || res.contains(&resource) {
                continue;
            }
            res.push(resource);
        }
        res
    }

    /// Whether a reference resource designates this table.
    pub fn is_named(&self, resource: &str) -> bool {
        self.url == resource || self.canonical_name == resource
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Tables addressable by URL and by canonical name.
#[derive(Debug, Default)]
pub struct TableIndex<'a> {
    tables: HashMap<&'a str, &'a Table>,
}

impl<'a> TableIndex<'a> {
    pub fn new(tables: impl IntoIterator<Item = &'a Table>) -> Self {
        let mut index = HashMap::new();
        for table in tables {
            index.insert(table.url.as_str(), table);
            index.entry(table.canonical_name.as_str()).or_insert(table);
        }
        Self { tables: index }
    }

    pub fn get(&self, resource: &str) -> Option<&'a Table> {
        self.tables.get(resource).copied()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn table(description: serde_json::Value) -> Table {
        table_with_sources(description, false)
    }

    pub(crate) fn table_with_sources(description: serde_json::Value, source_table: bool) -> Table {
        let description: TableDescription = serde_json::from_value(description).unwrap();
        Table::new(&description, source_table).unwrap()
    }

    #[test]
    fn test_canonical_name() {
        let t = table(json!({
            "url": "forms.csv",
            "dc:conformsTo": "http://cldf.clld.org/v1.0/terms.rdf#FormTable",
        }));
        assert_eq!(t.canonical_name, "FormTable");
        assert_eq!(table(json!({"url": "forms.csv"})).canonical_name, "forms.csv");
    }

    #[test]
    fn test_many_to_many_detection() {
        let t = table(json!({
            "url": "forms.csv",
            "tableSchema": {
                "columns": [
                    {"name": "ID"},
                    {"name": "Language_ID"},
                    {"name": "Segments", "separator": " "},
                    {"name": "Cognates", "separator": ";"}
                ],
                "primaryKey": ["ID"],
                "foreignKeys": [
                    {"columnReference": "Language_ID",
                     "reference": {"resource": "languages.csv", "columnReference": "ID"}},
                    {"columnReference": ["Cognates"],
                     "reference": {"resource": "cognates.csv", "columnReference": "ID"}},
                    {"columnReference": ["Segments", "ID"],
                     "reference": {"resource": "x.csv", "columnReference": ["a", "b"]}}
                ]
            }
        }));
        let flags: Vec<bool> = t.foreign_keys.iter().map(|fk| fk.many_to_many).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(t.many_to_many().count(), 1);
        assert_eq!(t.dependencies(), vec!["languages.csv", "cognates.csv", "x.csv"]);
    }

    #[test]
    fn test_unknown_key_column() {
        for schema in [
            json!({"columns": [{"name": "ID"}], "primaryKey": "Id"}),
            json!({"columns": [{"name": "ID"}], "foreignKeys": [
                {"columnReference": "Lang", "reference": {"resource": "l.csv", "columnReference": "ID"}}
            ]}),
        ] {
            let description: TableDescription =
                serde_json::from_value(json!({"url": "t.csv", "tableSchema": schema})).unwrap();
            assert!(matches!(
                Table::new(&description, false),
                Err(ConstructionError::UnknownColumn { .. })
            ));
        }
    }

    #[test]
    fn test_source_table_key() {
        let description = json!({
            "url": "values.csv",
            "tableSchema": {
                "columns": [
                    {"name": "ID"},
                    {"name": "Source", "propertyUrl": "http://cldf.clld.org/v1.0/terms.rdf#source", "separator": ";"}
                ],
                "primaryKey": "ID"
            }
        });
        let t = table_with_sources(description.clone(), true);
        assert_eq!(t.foreign_keys.len(), 1);
        assert!(t.foreign_keys[0].is_virtual());
        assert!(t.foreign_keys[0].many_to_many);
        assert!(t.dependencies().is_empty());

        assert!(table(description).foreign_keys.is_empty());
    }

    #[test]
    fn test_scalar_source_column_stays_in_table() {
        let t = table_with_sources(
            json!({
                "url": "values.csv",
                "tableSchema": {
                    "columns": [
                        {"name": "ID"},
                        {"name": "Source", "propertyUrl": "http://cldf.clld.org/v1.0/terms.rdf#source"}
                    ],
                    "primaryKey": "ID"
                }
            }),
            true,
        );
        assert!(t.foreign_keys.is_empty());
        assert_eq!(t.many_to_many().count(), 0);
    }

    #[test]
    fn test_self_reference_is_not_a_dependency() {
        let t = table(json!({
            "url": "params.csv",
            "tableSchema": {
                "columns": [{"name": "ID"}, {"name": "Parent"}],
                "primaryKey": "ID",
                "foreignKeys": [{"columnReference": "Parent",
                    "reference": {"resource": "params.csv", "columnReference": "ID"}}]
            }
        }));
        assert!(t.dependencies().is_empty());
        assert_eq!(t.key_column().unwrap().name, "ID");
    }

    #[test]
    fn test_table_dialect() {
        let t = table(json!({"url": "a.tsv", "dialect": {"delimiter": "\t"}}));
        assert_eq!(t.dialect.unwrap().delimiter, b'\t');
        let description: TableDescription =
            serde_json::from_value(json!({"url": "a.csv", "dialect": {"trim": "both"}})).unwrap();
        assert!(Table::new(&description, false).is_err());
    }
}
