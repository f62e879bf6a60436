//! Error types for the csvwdb loading pipeline.
//!
//! The hierarchy follows the order in which things can go wrong:
//!
//! - [`ConstructionError`] - malformed metadata, datatypes, dialects or references
//! - [`ValueError`] - a single cell failed to parse or violated a constraint
//! - [`TableError`] - reading and decoding one table's backing file
//! - [`SchemaError`] - ordering tables and synthesizing the relational schema
//! - [`StorageError`] - writing schema and rows into SQLite
//! - [`LoadError`] - top-level orchestration errors
//!
//! Each layer wraps the one below through `#[from]`, so a failing cell
//! surfaces as `LoadError::Table(TableError::Value { .. })` with its line.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Construction Errors
// =============================================================================

/// Errors while turning a metadata description into datatypes, columns and tables.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// A property has the wrong JSON type or an unusable value.
    #[error("Invalid property '{property}': {message}")]
    InvalidProperty { property: String, message: String },

    /// The datatype names a base we do not know.
    #[error("Unsupported datatype base: {0}")]
    UnsupportedBase(String),

    /// The datatype format is not a recognized layout for its base.
    #[error("Unsupported {base} format: {format}")]
    UnsupportedFormat { base: String, format: String },

    /// A string format is not a valid regular expression.
    #[error("Invalid format pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A key refers to a column the table does not have.
    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    /// A foreign key refers to a table the dataset does not have.
    #[error("Unknown table referenced: {0}")]
    UnknownTable(String),

    /// An association table needs a primary key on the owning table.
    #[error("Table '{0}' has no primary key")]
    MissingPrimaryKey(String),

    /// Two tables share a canonical name.
    #[error("Duplicate table name: {0}")]
    DuplicateTable(String),

    /// Failed to read the metadata document.
    #[error("Failed to read metadata: {0}")]
    Io(#[from] std::io::Error),

    /// The metadata document is not valid JSON for a table group.
    #[error("Invalid metadata JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl ConstructionError {
    pub fn invalid(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            property: property.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Value Errors
// =============================================================================

/// Errors for a single cell value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The text cannot be read as a value of the datatype.
    #[error("Invalid {base} value '{text}'")]
    InvalidValue { base: String, text: String },

    /// The value parsed but breaks a length, range or pattern constraint.
    #[error("Value '{text}' violates {constraint}")]
    ConstraintViolation { text: String, constraint: String },
}

impl ValueError {
    pub fn invalid(base: impl Into<String>, text: impl Into<String>) -> Self {
        Self::InvalidValue {
            base: base.into(),
            text: text.into(),
        }
    }

    pub fn violation(text: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            text: text.into(),
            constraint: constraint.into(),
        }
    }
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors while reading and decoding a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to open or read the backing file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is malformed CSV.
    #[error("Invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The `.zip` fallback could not be read.
    #[error("Failed to read archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// A record does not have one field per column.
    #[error("{table}, line {line}: expected {expected} fields, found {found}")]
    RecordLength {
        table: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A cell failed to decode.
    #[error("{table}, line {line}, column '{column}': {source}")]
    Value {
        table: String,
        line: u64,
        column: String,
        #[source]
        source: ValueError,
    },

    /// Rows are decoded exactly once.
    #[error("Table '{0}' has already been loaded")]
    AlreadyLoaded(String),

    /// The decoding task died before reporting back.
    #[error("Decoding task failed: {0}")]
    Task(String),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while ordering tables and synthesizing the relational schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No creation order satisfies the foreign keys of the listed tables.
    #[error("Cyclic dependency between tables: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// A list value for an association could not be split into value and context.
    #[error("Ill-formatted source: {0}")]
    MalformedAssociationValue(String),

    /// A decoded value could not be written back.
    #[error("Cannot store value: {0}")]
    Value(#[from] ValueError),

    /// A reference could not be resolved while writing SQL.
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors from the SQLite storage driver.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite rejected a statement.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Refusing to clobber an existing database.
    #[error("Database {0} already exists, use --overwrite to replace it")]
    AlreadyExists(PathBuf),

    /// Failed to remove the database being replaced.
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A table expected after loading is missing.
    #[error("Table '{0}' was not created")]
    MissingTable(String),
}

// =============================================================================
// Load Errors (top-level)
// =============================================================================

/// Top-level errors returned by [`crate::dataset::Dataset`] and the CLI.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Metadata error.
    #[error("Metadata error: {0}")]
    Construction(#[from] ConstructionError),

    /// Table decoding error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Schema synthesis error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for metadata construction.
pub type ConstructionResult<T> = Result<T, ConstructionError>;

/// Result type for cell values.
pub type ValueResult<T> = Result<T, ValueError>;

/// Result type for table reading.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for schema synthesis.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for dataset operations.
pub type LoadResult<T> = Result<T, LoadError>;
