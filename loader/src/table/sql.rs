//! SQL fragments and storage tuples for a single table.
//!
//! Many-to-many foreign keys never become columns or `FOREIGN KEY` clauses.
//! Each of them gets an association table `{owner}_{target}` instead:
//!
//! ```text
//! CREATE TABLE IF NOT EXISTS `FormTable_CognatesetTable` (
//!     `FormTable_ID`          TEXT,
//!     `CognatesetTable_ID`    TEXT,
//!     `context`               TEXT,
//!     FOREIGN KEY ...
//! );
//! ```

use super::{ForeignKey, Table, TableIndex, SOURCE_TABLE, SOURCE_TABLE_KEY};
use crate::column::Column;
use crate::datatype::{Cell, StorageValue};
use crate::error::{ConstructionError, SchemaError, SchemaResult};
use crate::schema::TableBatch;

/// Either side of an association table.
struct Side {
    table: String,
    key: String,
}

impl Side {
    fn column_name(&self) -> String {
        format!("{}_{}", self.table, self.key)
    }
}

impl Table {
    /// Columns that are stored in the table itself, in schema order.
    pub fn stored_columns(&self) -> Vec<&Column> {
        let associated: Vec<&str> = self
            .many_to_many()
            .filter_map(|fk| fk.column_reference.first())
            .filter_map(|name| self.column(name))
            .map(|c| c.canonical_name.as_str())
            .collect();
        self.columns
            .iter()
            .filter(|c| !associated.contains(&c.canonical_name.as_str()))
            .collect()
    }

    /// `CREATE TABLE` statement for the table itself.
    pub fn schema_clause(&self, index: &TableIndex<'_>, enforce: bool) -> SchemaResult<String> {
        let mut clauses: Vec<String> = self
            .stored_columns()
            .iter()
            .map(|c| c.sql_definition(enforce))
            .collect();

        if !self.primary_key.is_empty() {
            clauses.push(format!("PRIMARY KEY({})", quoted(self.local_names(&self.primary_key)?)));
        }

        for fk in self.foreign_keys.iter().filter(|fk| !fk.many_to_many) {
            let target = index
                .get(&fk.reference.resource)
                .ok_or_else(|| ConstructionError::UnknownTable(fk.reference.resource.clone()))?;
            clauses.push(format!(
                "FOREIGN KEY({}) REFERENCES `{}`({}) ON DELETE CASCADE",
                quoted(self.local_names(&fk.column_reference)?),
                target.canonical_name,
                quoted(target.local_names(&fk.reference.column_reference)?),
            ));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\n\t{}\n);",
            self.canonical_name,
            clauses.join(",\n\t")
        ))
    }

    /// One storage tuple per row, ordered like [`Table::stored_columns`].
    pub fn rows_as_storage_tuples(&self) -> SchemaResult<TableBatch> {
        let columns = self.stored_columns();
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let tuple = columns
                .iter()
                .map(|c| match row.get(&c.canonical_name) {
                    Some(cell) => c.to_storage(cell),
                    None => Ok(StorageValue::Null),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(tuple);
        }
        Ok(TableBatch {
            table_name: self.canonical_name.clone(),
            column_names: columns.iter().map(|c| c.canonical_name.clone()).collect(),
            rows,
        })
    }

    /// `CREATE TABLE` statement for the association table of a many-to-many key.
    pub fn association_schema(&self, fk: &ForeignKey, index: &TableIndex<'_>) -> SchemaResult<String> {
        let (owner, target) = self.association_sides(fk, index)?;
        let lines = [
            format!("CREATE TABLE IF NOT EXISTS `{}_{}` (", owner.table, target.table),
            format!("\t`{}`\tTEXT,", owner.column_name()),
            format!("\t`{}`\tTEXT,", target.column_name()),
            "\t`context`\tTEXT,".to_string(),
            format!(
                "\tFOREIGN KEY (`{}`) REFERENCES `{}`(`{}`) ON DELETE CASCADE,",
                owner.column_name(),
                owner.table,
                owner.key
            ),
            format!(
                "\tFOREIGN KEY (`{}`) REFERENCES `{}`(`{}`) ON DELETE CASCADE",
                target.column_name(),
                target.table,
                target.key
            ),
            ");".to_string(),
        ];
        Ok(lines.join("\n"))
    }

    /// Rows of the association table: one per value of the list-valued column.
    ///
    /// Source references may carry a context, as in `meier2005[12-15]`.
    pub fn association_rows(&self, fk: &ForeignKey, index: &TableIndex<'_>) -> SchemaResult<TableBatch> {
        let (owner, target) = self.association_sides(fk, index)?;
        let key_column = self
            .key_column()
            .ok_or_else(|| ConstructionError::MissingPrimaryKey(self.canonical_name.clone()))?;
        let list_column = fk
            .column_reference
            .first()
            .and_then(|name| self.column(name))
            .ok_or_else(|| ConstructionError::UnknownColumn {
                table: self.canonical_name.clone(),
                column: fk.column_reference.join(","),
            })?;

        let mut rows = Vec::new();
        for row in &self.rows {
            let Some(Cell::List(values)) = row.get(&list_column.canonical_name) else {
                continue;
            };
            let key = match row.get(&key_column.canonical_name) {
                Some(cell) => key_column.to_storage(cell)?,
                None => StorageValue::Null,
            };
            for value in values {
                let text = list_column.datatype.format(value)?;
                let (reference, context) = if fk.is_virtual() {
                    split_context(&text)?
                } else {
                    (text, list_column.canonical_name.clone())
                };
                rows.push(vec![
                    key.clone(),
                    StorageValue::Text(reference),
                    StorageValue::Text(context),
                ]);
            }
        }

        Ok(TableBatch {
            table_name: format!("{}_{}", owner.table, target.table),
            column_names: vec![owner.column_name(), target.column_name(), "context".to_string()],
            rows,
        })
    }

    fn association_sides(&self, fk: &ForeignKey, index: &TableIndex<'_>) -> SchemaResult<(Side, Side)> {
        let owner_key = self
            .key_column()
            .ok_or_else(|| ConstructionError::MissingPrimaryKey(self.canonical_name.clone()))?;
        let owner = Side {
            table: self.canonical_name.clone(),
            key: owner_key.canonical_name.clone(),
        };
        let target = if fk.is_virtual() {
            Side {
                table: SOURCE_TABLE.to_string(),
                key: SOURCE_TABLE_KEY.to_string(),
            }
        } else {
            let table = index
                .get(&fk.reference.resource)
                .ok_or_else(|| ConstructionError::UnknownTable(fk.reference.resource.clone()))?;
            let key = table
                .key_column()
                .ok_or_else(|| ConstructionError::MissingPrimaryKey(table.canonical_name.clone()))?;
            Side {
                table: table.canonical_name.clone(),
                key: key.canonical_name.clone(),
            }
        };
        Ok((owner, target))
    }

    /// Canonical names for column names of this table.
    fn local_names<'a>(&'a self, names: &[String]) -> SchemaResult<Vec<&'a str>> {
        names
            .iter()
            .map(|name| {
                self.column(name)
                    .map(|c| c.canonical_name.as_str())
                    .ok_or_else(|| {
                        SchemaError::from(ConstructionError::UnknownColumn {
                            table: self.canonical_name.clone(),
                            column: name.clone(),
                        })
                    })
            })
            .collect()
    }
}

fn quoted(names: Vec<&str>) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split `key[context]` into its parts. A value without brackets has an empty context.
fn split_context(text: &str) -> SchemaResult<(String, String)> {
    match text.split_once('[') {
        None => Ok((text.to_string(), String::new())),
        Some((key, rest)) => match rest.strip_suffix(']') {
            Some(context) => Ok((key.to_string(), context.to_string())),
            None => Err(SchemaError::MalformedAssociationValue(text.to_string())),
        },
    }
}
