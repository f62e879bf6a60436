//! Table creation order and relational schema synthesis.
//!
//! Tables are created after every table they reference, so that `FOREIGN KEY`
//! clauses always point backwards. Self references and references to the
//! virtual source table do not constrain the order. Association tables come
//! last, after all base tables.

use crate::datatype::StorageValue;
use crate::error::{SchemaError, SchemaResult};
use crate::table::{Table, TableIndex};

/// Rows for one SQL table, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBatch {
    pub table_name: String,
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<StorageValue>>,
}

/// DDL plus row batches in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub ddl: String,
    pub batches: Vec<TableBatch>,
}

/// Order tables so that each comes after the tables its foreign keys target.
///
/// Each pass moves the first table whose dependencies are all ordered; a pass
/// that finds none means the remaining tables reference each other in a cycle.
pub fn ordered_tables(tables: &[Table]) -> SchemaResult<Vec<&Table>> {
    let index = TableIndex::new(tables);
    let mut remaining: Vec<&Table> = tables.iter().collect();
    let mut ordered: Vec<&Table> = Vec::with_capacity(tables.len());

    for _ in 0..tables.len() {
        let ready = remaining.iter().position(|table| {
            table.dependencies().into_iter().all(|dep| match index.get(dep) {
                Some(target) => ordered.iter().any(|o| std::ptr::eq(*o, target)),
                // Unknown targets are reported when the schema is written.
                None => true,
            })
        });
        match ready {
            Some(i) => ordered.push(remaining.remove(i)),
            None => break,
        }
    }

    if !remaining.is_empty() {
        return Err(SchemaError::CyclicDependency(
            remaining.iter().map(|t| t.url.clone()).collect(),
        ));
    }
    Ok(ordered)
}

/// DDL and row batches for all tables: base tables in creation order, then
/// one association table per many-to-many foreign key.
pub fn synthesize(tables: &[Table], enforce: bool) -> SchemaResult<Schema> {
    let index = TableIndex::new(tables);
    let ordered = ordered_tables(tables)?;

    let mut ddl = Vec::new();
    let mut batches = Vec::new();
    for table in &ordered {
        ddl.push(table.schema_clause(&index, enforce)?);
        batches.push(table.rows_as_storage_tuples()?);
    }
    for table in &ordered {
        for fk in table.many_to_many() {
            ddl.push(table.association_schema(fk, &index)?);
            batches.push(table.association_rows(fk, &index)?);
        }
    }

    Ok(Schema {
        ddl: ddl.join("\n"),
        batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::table;
    use crate::table::Dialect;
    use serde_json::json;
    use std::path::Path;

    fn linked(url: &str, targets: &[&str]) -> Table {
        let mut columns = vec![json!({"name": "ID"})];
        let mut fks = Vec::new();
        for (i, target) in targets.iter().enumerate() {
            let name = format!("Ref{}", i);
            columns.push(json!({"name": name}));
            fks.push(json!({
                "columnReference": name,
                "reference": {"resource": target, "columnReference": "ID"}
            }));
        }
        table(json!({
            "url": url,
            "tableSchema": {"columns": columns, "primaryKey": "ID", "foreignKeys": fks}
        }))
    }

    fn urls(tables: Vec<&Table>) -> Vec<&str> {
        tables.into_iter().map(|t| t.url.as_str()).collect()
    }

    #[test]
    fn test_chain_order() {
        let tables = vec![linked("A", &["B"]), linked("B", &["C"]), linked("C", &[])];
        assert_eq!(urls(ordered_tables(&tables).unwrap()), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_self_reference_does_not_block() {
        let tables = vec![linked("A", &["A", "B"]), linked("B", &["B"])];
        assert_eq!(urls(ordered_tables(&tables).unwrap()), vec!["B", "A"]);
    }

    #[test]
    fn test_independent_tables_keep_metadata_order() {
        let tables = vec![linked("x", &[]), linked("y", &[]), linked("z", &["x"])];
        assert_eq!(urls(ordered_tables(&tables).unwrap()), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let tables = vec![
            linked("A", &["B"]),
            linked("B", &["C"]),
            linked("C", &["A"]),
            linked("D", &[]),
        ];
        match ordered_tables(&tables) {
            Err(SchemaError::CyclicDependency(names)) => assert_eq!(names, vec!["A", "B", "C"]),
            other => panic!("expected a cycle, got {:?}", other.map(urls)),
        }
    }

    #[test]
    fn test_reference_by_canonical_name() {
        let languages = table(json!({
            "url": "languages.csv",
            "dc:conformsTo": "http://cldf.clld.org/v1.0/terms.rdf#LanguageTable",
            "tableSchema": {"columns": [{"name": "ID"}], "primaryKey": "ID"}
        }));
        let tables = vec![linked("values.csv", &["LanguageTable"]), languages];
        assert_eq!(
            urls(ordered_tables(&tables).unwrap()),
            vec!["languages.csv", "values.csv"]
        );
    }

    #[test]
    fn test_synthesize_with_association() {
        let mut forms = table(json!({
            "url": "forms.csv",
            "tableSchema": {
                "columns": [{"name": "ID"}, {"name": "Cognates", "separator": ";"}],
                "primaryKey": "ID",
                "foreignKeys": [{"columnReference": "Cognates",
                    "reference": {"resource": "cognates.csv", "columnReference": "ID"}}]
            }
        }));
        forms
            .load_from_reader(
                "ID,Cognates\nr1,x;y\n".as_bytes(),
                Path::new("forms.csv"),
                &Dialect::default(),
                true,
            )
            .unwrap();
        let mut cognates = table(json!({
            "url": "cognates.csv",
            "tableSchema": {"columns": [{"name": "ID"}], "primaryKey": "ID"}
        }));
        cognates
            .load_from_reader("ID\nx\ny\n".as_bytes(), Path::new("c.csv"), &Dialect::default(), true)
            .unwrap();

        let schema = synthesize(&[forms, cognates], true).unwrap();
        let statements: Vec<&str> = schema
            .ddl
            .lines()
            .filter(|l| l.starts_with("CREATE TABLE"))
            .collect();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE IF NOT EXISTS `cognates.csv` (",
                "CREATE TABLE IF NOT EXISTS `forms.csv` (",
                "CREATE TABLE IF NOT EXISTS `forms.csv_cognates.csv` (",
            ]
        );
        let names: Vec<&str> = schema.batches.iter().map(|b| b.table_name.as_str()).collect();
        assert_eq!(names, vec!["cognates.csv", "forms.csv", "forms.csv_cognates.csv"]);
        let association = &schema.batches[2];
        assert_eq!(association.rows.len(), 2);
        assert_eq!(association.rows[0][0], StorageValue::Text("r1".into()));
        assert_eq!(association.rows[1][1], StorageValue::Text("y".into()));
        // The list column is not stored in the base table.
        assert_eq!(schema.batches[1].column_names, vec!["ID"]);
    }
}
