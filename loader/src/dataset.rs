//! Dataset orchestration: metadata to tables, tables to rows, rows to schema.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvwdb::{Dataset, LoadOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = LoadOptions::default();
//!     let dataset = Dataset::from_path(Path::new("cldf/Wordlist-metadata.json"), &options)?
//!         .load_data(&options)
//!         .await?;
//!     let schema = dataset.schema(options.enforce_constraints)?;
//!     println!("{}", schema.ddl);
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConstructionError, ConstructionResult, LoadResult, SchemaResult, TableError, TableResult};
use crate::logs::{log_info, log_success, log_table, log_warning, LogLevel};
use crate::metadata::TableGroupDescription;
use crate::paths;
use crate::schema::{self, Schema};
use crate::table::{Dialect, Table, TableIndex};

// =============================================================================
// Options
// =============================================================================

/// Options for loading a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Check length, range and pattern constraints while decoding, and emit
    /// matching CHECK clauses in the schema
    pub enforce_constraints: bool,

    /// Link `cldf_source` columns to the virtual `SourceTable`
    pub source_table: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            enforce_constraints: true,
            source_table: false,
        }
    }
}

impl LoadOptions {
    /// Defaults, overridden by `CSVWDB_NO_CHECKS` and `CSVWDB_SOURCE_TABLE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };
        let defaults = Self::default();
        Self {
            enforce_constraints: defaults.enforce_constraints && !flag("CSVWDB_NO_CHECKS"),
            source_table: defaults.source_table || flag("CSVWDB_SOURCE_TABLE"),
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// A table group with its tables, in metadata order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub metadata_path: PathBuf,
    /// Table group annotations other than `tables` and `dialect`.
    pub metadata: Map<String, Value>,
    pub dialect: Dialect,
    tables: Vec<Table>,
}

impl Dataset {
    /// Read a metadata document and build its tables. No rows are read yet.
    pub fn from_path(path: &Path, options: &LoadOptions) -> ConstructionResult<Self> {
        let description = TableGroupDescription::from_path(path)?;
        Self::from_metadata(description, path, options)
    }

    /// Build tables from an already parsed description. `path` locates the
    /// metadata document; table URLs are resolved against its directory.
    pub fn from_metadata(
        description: TableGroupDescription,
        path: &Path,
        options: &LoadOptions,
    ) -> ConstructionResult<Self> {
        let dialect = Dialect::from_json(description.dialect.as_ref())?;
        let tables = description
            .tables
            .iter()
            .map(|t| Table::new(t, options.source_table))
            .collect::<ConstructionResult<Vec<_>>>()?;

        let mut names = HashSet::new();
        for table in &tables {
            if !names.insert(table.canonical_name.as_str()) {
                return Err(ConstructionError::DuplicateTable(table.canonical_name.clone()));
            }
        }
        let index = TableIndex::new(&tables);
        for fk in tables.iter().flat_map(|t| &t.foreign_keys) {
            if !fk.is_virtual() && index.get(&fk.reference.resource).is_none() {
                return Err(ConstructionError::UnknownTable(fk.reference.resource.clone()));
            }
        }

        if tables.is_empty() {
            log_warning(format!("{}: no tables", path.display()));
        } else {
            log_info(format!("{}: {} tables", path.display(), tables.len()));
        }
        Ok(Self {
            metadata_path: path.to_path_buf(),
            metadata: description.properties,
            dialect,
            tables,
        })
    }

    /// Directory that table URLs are relative to.
    pub fn dir(&self) -> &Path {
        self.metadata_path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Look up a table by URL or canonical name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.is_named(name))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Rows decoded for a table, `None` for unknown tables.
    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.table(name).map(|t| t.rows().len())
    }

    pub fn column_count(&self, name: &str) -> Option<usize> {
        self.table(name).map(|t| t.columns.len())
    }

    /// The file backing a table, including the `.zip` fallback.
    pub fn table_path(&self, table: &Table) -> PathBuf {
        paths::resolve(&self.dir().join(&table.url))
    }

    /// Decode all tables concurrently, one blocking task per table.
    ///
    /// The first failure is returned; the dataset is consumed either way, so a
    /// partially loaded dataset never reaches schema synthesis.
    pub async fn load_data(self, options: &LoadOptions) -> LoadResult<Self> {
        let Dataset {
            metadata_path,
            metadata,
            dialect,
            tables,
        } = self;
        let dir = metadata_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let count = tables.len();
        let enforce = options.enforce_constraints;

        let mut tasks: FuturesUnordered<_> = tables
            .into_iter()
            .enumerate()
            .map(|(i, mut table)| {
                let dir = dir.clone();
                let dialect = dialect.clone();
                tokio::task::spawn_blocking(move || {
                    let res = table.load(&dir, &dialect, enforce);
                    (i, table, res)
                })
            })
            .collect();

        let mut slots: Vec<Option<Table>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.next().await {
            let (i, table, res) = joined.map_err(|e| TableError::Task(e.to_string()))?;
            log_rows(&table, res)?;
            slots[i] = Some(table);
        }

        log_success(format!("Loaded {} tables", count));
        Ok(Self {
            metadata_path,
            metadata,
            dialect,
            tables: slots.into_iter().flatten().collect(),
        })
    }

    /// Decode all tables one after the other on the current thread.
    pub fn load_data_sequential(mut self, options: &LoadOptions) -> LoadResult<Self> {
        let dir = self.dir().to_path_buf();
        for table in &mut self.tables {
            let res = table.load(&dir, &self.dialect, options.enforce_constraints);
            log_rows(table, res)?;
        }
        Ok(self)
    }

    /// Relational schema and row batches for the loaded tables.
    pub fn schema(&self, enforce: bool) -> SchemaResult<Schema> {
        schema::synthesize(&self.tables, enforce)
    }
}

fn log_rows(table: &Table, res: TableResult<usize>) -> TableResult<usize> {
    match &res {
        Ok(0) => log_table(LogLevel::Warning, &table.canonical_name, "no rows"),
        Ok(rows) => log_table(LogLevel::Success, &table.canonical_name, format!("{} rows", rows)),
        Err(e) => log_table(LogLevel::Error, &table.canonical_name, e.to_string()),
    }
    res
}

/// Read metadata and decode all tables.
pub async fn load(path: &Path, options: &LoadOptions) -> LoadResult<Dataset> {
    Dataset::from_path(path, options)?.load_data(options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{Cell, StorageValue, Value};
    use crate::error::{LoadError, SchemaError};
    use crate::storage::{load_schema, SqliteStorage};
    use std::collections::HashMap;

    const METADATA: &str = r##"{
        "@context": "http://www.w3.org/ns/csvw",
        "dc:title": "A tiny wordlist",
        "dialect": {"commentPrefix": "#"},
        "tables": [
            {
                "url": "forms.csv",
                "dc:conformsTo": "http://cldf.clld.org/v1.0/terms.rdf#FormTable",
                "tableSchema": {
                    "columns": [
                        {"name": "ID"},
                        {"name": "Language_ID", "propertyUrl": "http://cldf.clld.org/v1.0/terms.rdf#languageReference"},
                        {"name": "Form"},
                        {"name": "Source", "propertyUrl": "http://cldf.clld.org/v1.0/terms.rdf#source", "separator": ";"}
                    ],
                    "primaryKey": "ID",
                    "foreignKeys": [{
                        "columnReference": "Language_ID",
                        "reference": {"resource": "languages.csv", "columnReference": "ID"}
                    }]
                }
            },
            {
                "url": "languages.csv",
                "dc:conformsTo": "http://cldf.clld.org/v1.0/terms.rdf#LanguageTable",
                "tableSchema": {
                    "columns": [
                        {"name": "ID"},
                        {"name": "Latitude", "datatype": {"base": "decimal", "minimum": -90, "maximum": 90}, "null": ["NA"]}
                    ],
                    "primaryKey": "ID"
                }
            }
        ]
    }"##;

    fn write_dataset(files: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let path = dir.path().join("Wordlist-metadata.json");
        (dir, path)
    }

    fn valid_dataset() -> (tempfile::TempDir, PathBuf) {
        write_dataset(&[
            ("Wordlist-metadata.json", METADATA),
            (
                "forms.csv",
                "ID,Language_ID,Form,Source\n# skipped\nf1,stan1295,Hand,meier2005[12];smith2001\nf2,stan1295,Fuß,\n",
            ),
            ("languages.csv", "ID,Latitude\nstan1295,52.5\nnone,NA\n"),
        ])
    }

    #[test]
    fn test_construction() {
        let (_dir, path) = valid_dataset();
        let ds = Dataset::from_path(&path, &LoadOptions::default()).unwrap();
        assert_eq!(ds.table_count(), 2);
        assert_eq!(ds.metadata["dc:title"], "A tiny wordlist");
        assert_eq!(ds.dialect.comment_prefix, Some(b'#'));
        assert_eq!(ds.table("FormTable").unwrap().url, "forms.csv");
        assert_eq!(ds.column_count("languages.csv"), Some(2));
        assert_eq!(ds.row_count("FormTable"), Some(0));
        assert!(ds.table("ParameterTable").is_none());
    }

    #[test]
    fn test_unknown_reference_target() {
        let metadata = METADATA.replace("\"resource\": \"languages.csv\"", "\"resource\": \"lects.csv\"");
        let (_dir, path) = write_dataset(&[("Wordlist-metadata.json", &metadata)]);
        assert!(matches!(
            Dataset::from_path(&path, &LoadOptions::default()),
            Err(ConstructionError::UnknownTable(name)) if name == "lects.csv"
        ));
    }

    #[test]
    fn test_duplicate_table_names() {
        let metadata = METADATA.replace("#LanguageTable", "#FormTable");
        let (_dir, path) = write_dataset(&[("Wordlist-metadata.json", &metadata)]);
        assert!(matches!(
            Dataset::from_path(&path, &LoadOptions::default()),
            Err(ConstructionError::DuplicateTable(_))
        ));
    }

    #[tokio::test]
    async fn test_load_and_synthesize() {
        let (_dir, path) = valid_dataset();
        let options = LoadOptions {
            source_table: true,
            ..LoadOptions::default()
        };
        let ds = load(&path, &options).await.unwrap();
        assert_eq!(ds.row_count("FormTable"), Some(2));
        assert_eq!(ds.row_count("LanguageTable"), Some(2));
        let languages = ds.table("LanguageTable").unwrap();
        assert_eq!(languages.rows()[1]["Latitude"], Cell::Absent);
        assert_eq!(
            ds.table("FormTable").unwrap().rows()[1]["Form"],
            Cell::Scalar(Value::String("Fuß".into()))
        );

        let schema = ds.schema(true).unwrap();
        let names: Vec<&str> = schema.batches.iter().map(|b| b.table_name.as_str()).collect();
        assert_eq!(names, vec!["LanguageTable", "FormTable", "FormTable_SourceTable"]);
        assert!(schema.ddl.contains("CHECK(`Latitude` >= -90 AND `Latitude` <= 90)"));
        assert!(schema
            .ddl
            .contains("FOREIGN KEY(`cldf_languageReference`) REFERENCES `LanguageTable`(`ID`) ON DELETE CASCADE"));

        let sources = &schema.batches[2];
        assert_eq!(sources.column_names, vec!["FormTable_ID", "SourceTable_id", "context"]);
        assert_eq!(
            sources.rows[0],
            vec![
                StorageValue::Text("f1".into()),
                StorageValue::Text("meier2005".into()),
                StorageValue::Text("12".into())
            ]
        );
        assert_eq!(sources.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let (_dir, path) = valid_dataset();
        let options = LoadOptions::default();
        let concurrent = load(&path, &options).await.unwrap();
        let sequential = Dataset::from_path(&path, &options)
            .unwrap()
            .load_data_sequential(&options)
            .unwrap();
        let rows = |ds: &Dataset| -> HashMap<String, usize> {
            ds.tables()
                .iter()
                .map(|t| (t.canonical_name.clone(), t.rows().len()))
                .collect()
        };
        assert_eq!(rows(&concurrent), rows(&sequential));
        assert_eq!(concurrent.schema(true).unwrap(), sequential.schema(true).unwrap());
    }

    #[tokio::test]
    async fn test_first_error_fails_the_load() {
        let (_dir, path) = write_dataset(&[
            ("Wordlist-metadata.json", METADATA),
            ("forms.csv", "ID,Language_ID,Form,Source\n"),
            ("languages.csv", "ID,Latitude\nstan1295,91\n"),
        ]);
        let res = load(&path, &LoadOptions::default()).await;
        assert!(matches!(res, Err(LoadError::Table(TableError::Value { .. }))));

        // Without enforcement the out-of-range latitude is accepted.
        let options = LoadOptions {
            enforce_constraints: false,
            ..LoadOptions::default()
        };
        let ds = load(&path, &options).await.unwrap();
        assert!(!ds.schema(false).unwrap().ddl.contains("CHECK"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (_dir, path) = write_dataset(&[
            ("Wordlist-metadata.json", METADATA),
            ("languages.csv", "ID,Latitude\n"),
        ]);
        assert!(matches!(
            load(&path, &LoadOptions::default()).await,
            Err(LoadError::Table(TableError::Io { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cycle_surfaces_as_schema_error() {
        let metadata = r#"{"tables": [
            {"url": "a.csv", "tableSchema": {"columns": [{"name": "ID"}, {"name": "B"}], "primaryKey": "ID",
                "foreignKeys": [{"columnReference": "B", "reference": {"resource": "b.csv", "columnReference": "ID"}}]}},
            {"url": "b.csv", "tableSchema": {"columns": [{"name": "ID"}, {"name": "A"}], "primaryKey": "ID",
                "foreignKeys": [{"columnReference": "A", "reference": {"resource": "a.csv", "columnReference": "ID"}}]}}
        ]}"#;
        let (_dir, path) = write_dataset(&[
            ("Wordlist-metadata.json", metadata),
            ("a.csv", "ID,B\n"),
            ("b.csv", "ID,A\n"),
        ]);
        let ds = load(&path, &LoadOptions::default()).await.unwrap();
        assert!(matches!(ds.schema(true), Err(SchemaError::CyclicDependency(_))));
    }

    #[tokio::test]
    async fn test_temporal_bounds_store_in_sqlite() {
        let metadata = r#"{"tables": [{
            "url": "events.csv",
            "tableSchema": {
                "columns": [
                    {"name": "ID"},
                    {"name": "D", "datatype": {"base": "date", "format": "dd.MM.yyyy", "minimum": "10.12.2018"}},
                    {"name": "T", "datatype": {"base": "dateTimeStamp", "maximum": "2018-12-10T20:00:00Z"}}
                ],
                "primaryKey": "ID"
            }
        }]}"#;
        let (_dir, path) = write_dataset(&[
            ("Wordlist-metadata.json", metadata),
            ("events.csv", "ID,D,T\ne1,01.01.2019,2018-12-10T21:00:00+02:00\n"),
        ]);
        let ds = load(&path, &LoadOptions::default()).await.unwrap();
        let schema = ds.schema(true).unwrap();
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(load_schema(&mut storage, &schema).unwrap(), 1);
        assert_eq!(storage.row_count("events.csv").unwrap(), 1);
    }

    #[test]
    fn test_options_from_lookup() {
        let options = LoadOptions::from_lookup(|key| match key {
            "CSVWDB_NO_CHECKS" => Some("yes".into()),
            _ => None,
        });
        assert!(!options.enforce_constraints);
        assert!(!options.source_table);

        let options = LoadOptions::from_lookup(|key| match key {
            "CSVWDB_SOURCE_TABLE" => Some("1".into()),
            "CSVWDB_NO_CHECKS" => Some("false".into()),
            _ => None,
        });
        assert!(options.enforce_constraints);
        assert!(options.source_table);
    }
}
