//! Decoding a table's CSV file into rows.

use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use super::{Dialect, Row, Table};
use crate::error::{TableError, TableResult};
use crate::paths;

impl Table {
    /// Decode the table's file, resolved against `dir`, into rows.
    ///
    /// The table's own dialect wins over `default_dialect`. Returns the number of rows.
    pub fn load(&mut self, dir: &Path, default_dialect: &Dialect, enforce: bool) -> TableResult<usize> {
        if self.loaded {
            return Err(TableError::AlreadyLoaded(self.canonical_name.clone()));
        }
        let path = dir.join(&self.url);
        let source = paths::open_source(&path)?;
        self.load_from_reader(source, &path, default_dialect, enforce)
    }

    /// Decode rows from any reader. `path` is only used in error messages.
    pub fn load_from_reader<R: Read>(
        &mut self,
        source: R,
        path: &Path,
        default_dialect: &Dialect,
        enforce: bool,
    ) -> TableResult<usize> {
        if self.loaded {
            return Err(TableError::AlreadyLoaded(self.canonical_name.clone()));
        }
        let dialect = self.dialect.clone().unwrap_or_else(|| default_dialect.clone());
        let mut reader = ReaderBuilder::new()
            .delimiter(dialect.delimiter)
            .comment(dialect.comment_prefix)
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|source| TableError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            if index == 0 && dialect.header {
                continue;
            }
            let line = record.position().map_or(index as u64 + 1, |p| p.line());
            if record.len() != self.columns.len() {
                return Err(TableError::RecordLength {
                    table: self.canonical_name.clone(),
                    line,
                    expected: self.columns.len(),
                    found: record.len(),
                });
            }
            let mut row = Row::with_capacity(self.columns.len());
            for (column, field) in self.columns.iter().zip(record.iter()) {
                let cell = column
                    .decode(dialect.trim.apply(field), true, enforce)
                    .map_err(|source| TableError::Value {
                        table: self.canonical_name.clone(),
                        line,
                        column: column.name.clone(),
                        source,
                    })?;
                row.insert(column.canonical_name.clone(), cell);
            }
            rows.push(row);
        }

        self.rows = rows;
        self.loaded = true;
        Ok(self.rows.len())
    }
}
