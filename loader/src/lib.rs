//! # csvwdb - load CSVW table groups into SQLite
//!
//! csvwdb reads a CSVW metadata document (typically a CLDF dataset), decodes
//! every table it describes, and writes the result into a relational database
//! with primary keys, foreign keys and association tables for list-valued
//! references.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Metadata   │────▶│   Tables    │────▶│   Schema    │────▶│   SQLite    │
//! │   (JSON)    │     │ (CSV, zip)  │     │ (DDL, rows) │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csvwdb::{load, load_schema, LoadOptions, SqliteStorage};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = LoadOptions::default();
//!     let dataset = load(Path::new("Wordlist-metadata.json"), &options).await?;
//!     let schema = dataset.schema(options.enforce_constraints)?;
//!     let mut db = SqliteStorage::create(Path::new("wordlist.sqlite"), false)?;
//!     load_schema(&mut db, &schema)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Progress logging
//! - [`datatype`] - CSVW datatypes: parsing, formatting, constraints
//! - [`column`] - Column descriptions and cell decoding
//! - [`table`] - Tables, dialects, CSV decoding and per-table SQL
//! - [`schema`] - Creation order and schema synthesis
//! - [`dataset`] - Table group orchestration
//! - [`storage`] - Database drivers

// Core modules
pub mod error;
pub mod logs;

// Metadata
pub mod metadata;
pub mod paths;

// Datatypes and columns
pub mod column;
pub mod datatype;

// Tables
pub mod schema;
pub mod table;

// Orchestration
pub mod dataset;

// Storage
pub mod storage;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConstructionError, LoadError, SchemaError, StorageError, TableError, ValueError,
};

// =============================================================================
// Re-exports - Datatypes
// =============================================================================

pub use datatype::{Cell, Datatype, StorageKind, StorageValue, Temporal, TemporalKind, Value};

// =============================================================================
// Re-exports - Tables
// =============================================================================

pub use column::Column;
pub use metadata::TableGroupDescription;
pub use table::{Dialect, ForeignKey, Row, Table, TableIndex};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{ordered_tables, synthesize, Schema, TableBatch};

// =============================================================================
// Re-exports - Dataset
// =============================================================================

pub use dataset::{load, Dataset, LoadOptions};

// =============================================================================
// Re-exports - Storage
// =============================================================================

pub use storage::{load_schema, SqliteStorage, Storage};
