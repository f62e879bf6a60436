//! Writing a synthesized schema into a database.
//!
//! - [`Storage`] - the driver seam: run DDL, insert row batches
//! - [`load_schema`] - DDL first, then every batch in creation order, in one transaction
//! - [`sqlite::SqliteStorage`] - the SQLite driver

pub mod sqlite;

use crate::error::StorageResult;
use crate::logs::{log_error, log_table, LogLevel};
use crate::schema::{Schema, TableBatch};

pub use sqlite::SqliteStorage;

/// Bound parameter limit for SQLite 3.32 and later.
pub const MAX_PARAMS: usize = 32000;

/// Bound parameter limit for older SQLite versions.
pub const LEGACY_MAX_PARAMS: usize = 900;

/// A database the loader can write into.
pub trait Storage {
    /// Run one or more DDL statements.
    fn execute_schema(&mut self, ddl: &str) -> StorageResult<()>;

    /// Insert all rows of a batch. Returns the number of rows written.
    fn insert_batch(&mut self, batch: &TableBatch) -> StorageResult<usize>;

    fn begin(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

/// Create all tables and insert all rows. Returns the total number of rows.
///
/// Everything happens in one transaction; on failure nothing is kept.
pub fn load_schema<S: Storage + ?Sized>(storage: &mut S, schema: &Schema) -> StorageResult<usize> {
    storage.begin()?;
    match write_all(storage, schema) {
        Ok(total) => {
            storage.commit()?;
            Ok(total)
        }
        Err(e) => {
            // Report the write error, not the rollback.
            let _ = storage.rollback();
            log_error(format!("Load rolled back: {}", e));
            Err(e)
        }
    }
}

fn write_all<S: Storage + ?Sized>(storage: &mut S, schema: &Schema) -> StorageResult<usize> {
    storage.execute_schema(&schema.ddl)?;
    let mut total = 0;
    for batch in &schema.batches {
        let n = storage.insert_batch(batch)?;
        log_table(LogLevel::Info, &batch.table_name, format!("{} rows written", n));
        total += n;
    }
    Ok(total)
}

/// Rows per multi-row `INSERT` so that bound parameters stay under `max_params`.
pub fn rows_per_statement(columns: usize, max_params: usize) -> usize {
    (max_params / (columns + 1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::StorageValue;
    use crate::error::StorageError;

    /// Records calls instead of writing anywhere.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_on: Option<String>,
    }

    impl Storage for Recorder {
        fn execute_schema(&mut self, ddl: &str) -> StorageResult<()> {
            self.calls.push(format!("ddl {}", ddl.lines().count()));
            Ok(())
        }

        fn insert_batch(&mut self, batch: &TableBatch) -> StorageResult<usize> {
            if self.fail_on.as_deref() == Some(batch.table_name.as_str()) {
                return Err(StorageError::MissingTable(batch.table_name.clone()));
            }
            self.calls.push(format!("insert {}", batch.table_name));
            Ok(batch.rows.len())
        }

        fn begin(&mut self) -> StorageResult<()> {
            self.calls.push("begin".into());
            Ok(())
        }

        fn commit(&mut self) -> StorageResult<()> {
            self.calls.push("commit".into());
            Ok(())
        }

        fn rollback(&mut self) -> StorageResult<()> {
            self.calls.push("rollback".into());
            Ok(())
        }
    }

    fn schema() -> Schema {
        let batch = |name: &str, n: usize| TableBatch {
            table_name: name.into(),
            column_names: vec!["ID".into()],
            rows: vec![vec![StorageValue::Text("x".into())]; n],
        };
        Schema {
            ddl: "CREATE TABLE a (ID);\nCREATE TABLE b (ID);".into(),
            batches: vec![batch("a", 2), batch("b", 3)],
        }
    }

    #[test]
    fn test_load_schema_order() {
        let mut storage = Recorder::default();
        assert_eq!(load_schema(&mut storage, &schema()).unwrap(), 5);
        assert_eq!(
            storage.calls,
            vec!["begin", "ddl 2", "insert a", "insert b", "commit"]
        );
    }

    #[test]
    fn test_load_schema_rolls_back() {
        let mut storage = Recorder {
            fail_on: Some("b".into()),
            ..Recorder::default()
        };
        assert!(load_schema(&mut storage, &schema()).is_err());
        assert_eq!(storage.calls, vec!["begin", "ddl 2", "insert a", "rollback"]);
    }

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(3, MAX_PARAMS), 8000);
        assert_eq!(rows_per_statement(3, LEGACY_MAX_PARAMS), 225);
        assert_eq!(rows_per_statement(2000, LEGACY_MAX_PARAMS), 1);
    }
}
