//! SQLite driver.

use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection};

use super::{rows_per_statement, Storage, LEGACY_MAX_PARAMS, MAX_PARAMS};
use crate::error::{StorageError, StorageResult};
use crate::schema::{Schema, TableBatch};

pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
    max_params: usize,
}

impl SqliteStorage {
    /// Create a new database file. An existing file is only replaced with `overwrite`.
    pub fn create(path: &Path, overwrite: bool) -> StorageResult<Self> {
        if path.exists() {
            if !overwrite {
                return Err(StorageError::AlreadyExists(path.to_path_buf()));
            }
            std::fs::remove_file(path)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::configure(Connection::open_in_memory()?, None)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        // journal_mode answers with the new mode, so it needs the checked variant.
        conn.pragma_update_and_check(None, "journal_mode", "MEMORY", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        let max_params = if rusqlite::version_number() >= 3_032_000 {
            MAX_PARAMS
        } else {
            LEGACY_MAX_PARAMS
        };
        Ok(Self {
            conn,
            path,
            max_params,
        })
    }

    /// Database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn row_count(&self, table: &str) -> StorageResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM `{}`", table);
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Check that every table of the schema exists.
    pub fn verify(&self, schema: &Schema) -> StorageResult<()> {
        let names = self.table_names()?;
        for batch in &schema.batches {
            if !names.contains(&batch.table_name) {
                return Err(StorageError::MissingTable(batch.table_name.clone()));
            }
        }
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn execute_schema(&mut self, ddl: &str) -> StorageResult<()> {
        self.conn.execute_batch(ddl)?;
        Ok(())
    }

    fn insert_batch(&mut self, batch: &TableBatch) -> StorageResult<usize> {
        if batch.rows.is_empty() || batch.column_names.is_empty() {
            return Ok(0);
        }
        let columns = batch
            .column_names
            .iter()
            .map(|c| format!("`{}`", c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = format!("({})", vec!["?"; batch.column_names.len()].join(", "));

        for chunk in batch
            .rows
            .chunks(rows_per_statement(batch.column_names.len(), self.max_params))
        {
            let sql = format!(
                "INSERT INTO `{}` ({}) VALUES {}",
                batch.table_name,
                columns,
                vec![placeholders.as_str(); chunk.len()].join(", ")
            );
            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(chunk.iter().flatten()))?;
        }
        Ok(batch.rows.len())
    }

    fn begin(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::StorageValue;
    use crate::storage::load_schema;

    fn schema(rows: usize) -> Schema {
        Schema {
            ddl: "CREATE TABLE IF NOT EXISTS `LanguageTable` (\n\
                  \t`ID`\tTEXT,\n\
                  \t`Latitude`\tREAL,\n\
                  \tPRIMARY KEY(`ID`)\n\
                  );\n\
                  CREATE TABLE IF NOT EXISTS `ValueTable` (\n\
                  \t`ID`\tTEXT,\n\
                  \t`cldf_languageReference`\tTEXT,\n\
                  \t`Count`\tINTEGER,\n\
                  \tPRIMARY KEY(`ID`),\n\
                  \tFOREIGN KEY(`cldf_languageReference`) REFERENCES `LanguageTable`(`ID`) ON DELETE CASCADE\n\
                  );"
            .into(),
            batches: vec![
                TableBatch {
                    table_name: "LanguageTable".into(),
                    column_names: vec!["ID".into(), "Latitude".into()],
                    rows: vec![
                        vec!["stan1295".into(), StorageValue::Real(52.5)],
                        vec!["none".into(), StorageValue::Null],
                    ],
                },
                TableBatch {
                    table_name: "ValueTable".into(),
                    column_names: vec!["ID".into(), "cldf_languageReference".into(), "Count".into()],
                    rows: (0..rows)
                        .map(|i| {
                            vec![
                                format!("v{}", i).into(),
                                "stan1295".into(),
                                StorageValue::Integer(i as i64),
                            ]
                        })
                        .collect(),
                },
            ],
        }
    }

    #[test]
    fn test_round_trip_in_memory() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let schema = schema(3);
        assert_eq!(load_schema(&mut storage, &schema).unwrap(), 5);
        storage.verify(&schema).unwrap();
        assert_eq!(storage.table_names().unwrap(), vec!["LanguageTable", "ValueTable"]);
        assert_eq!(storage.row_count("ValueTable").unwrap(), 3);

        let latitude: Option<f64> = storage
            .connection()
            .query_row("SELECT Latitude FROM LanguageTable WHERE ID = 'none'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(latitude, None);
    }

    #[test]
    fn test_chunked_inserts() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.max_params = 8;
        assert_eq!(load_schema(&mut storage, &schema(7)).unwrap(), 9);
        assert_eq!(storage.row_count("ValueTable").unwrap(), 7);
        let total: i64 = storage
            .connection()
            .query_row("SELECT SUM(Count) FROM ValueTable", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 21);
    }

    #[test]
    fn test_failed_load_keeps_nothing() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let mut schema = schema(1);
        schema.batches[1].rows.push(vec!["v0".into(), "x".into(), StorageValue::Null]);
        assert!(load_schema(&mut storage, &schema).is_err());
        assert!(storage.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cldf.sqlite");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            SqliteStorage::create(&path, false),
            Err(StorageError::AlreadyExists(_))
        ));

        let mut storage = SqliteStorage::create(&path, true).unwrap();
        load_schema(&mut storage, &schema(2)).unwrap();
        assert_eq!(storage.path(), Some(path.as_path()));
        drop(storage);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
