//! csvwdb CLI - load CSVW table groups into SQLite
//!
//! # Commands
//!
//! ```bash
//! csvwdb stats Wordlist-metadata.json              # Tables, row counts, file sizes
//! csvwdb stats Wordlist-metadata.json -m           # ... plus dataset metadata
//! csvwdb createdb Wordlist-metadata.json db.sqlite # Load into SQLite
//! csvwdb schema Wordlist-metadata.json             # Print the DDL
//! ```
//!
//! `CSVWDB_NO_CHECKS` and `CSVWDB_SOURCE_TABLE` (environment or `.env`) set
//! the defaults for `--no-checks` and `--source-table`.

use clap::{Parser, Subcommand};
use csvwdb::logs::{log_info, log_success};
use csvwdb::paths::formatted_size;
use csvwdb::{load, load_schema, Dataset, LoadOptions, SqliteStorage, StorageError};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "csvwdb")]
#[command(about = "Load CSVW table groups (and CLDF datasets) into SQLite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables of a dataset with row counts and file sizes
    Stats {
        /// Metadata JSON file
        metadata: PathBuf,

        /// Also print the dataset metadata
        #[arg(short = 'm', long = "metadata")]
        show_metadata: bool,
    },

    /// Load a dataset into a new SQLite database
    Createdb {
        /// Metadata JSON file
        metadata: PathBuf,

        /// SQLite database file to create
        db: PathBuf,

        /// Replace the database if it exists
        #[arg(short = 'f', long)]
        overwrite: bool,

        #[command(flatten)]
        flags: LoadFlags,
    },

    /// Print the SQL schema of a dataset
    Schema {
        /// Metadata JSON file
        metadata: PathBuf,

        #[command(flatten)]
        flags: LoadFlags,
    },
}

#[derive(clap::Args)]
struct LoadFlags {
    /// Skip length, range and pattern checks
    #[arg(long)]
    no_checks: bool,

    /// Link source references to a SourceTable
    #[arg(long)]
    source_table: bool,
}

impl LoadFlags {
    fn options(&self) -> LoadOptions {
        let mut options = LoadOptions::from_env();
        if self.no_checks {
            options.enforce_constraints = false;
        }
        if self.source_table {
            options.source_table = true;
        }
        options
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Stats {
            metadata,
            show_metadata,
        } => cmd_stats(&metadata, show_metadata).await,

        Commands::Createdb {
            metadata,
            db,
            overwrite,
            flags,
        } => cmd_createdb(&metadata, &db, overwrite, &flags.options()).await,

        Commands::Schema { metadata, flags } => cmd_schema(&metadata, &flags.options()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_stats(metadata: &Path, show_metadata: bool) -> Result<(), Box<dyn std::error::Error>> {
    let options = LoadOptions::from_env();
    let dataset = load(metadata, &options).await?;

    println!("{}\n", dataset.metadata_path.display());
    if show_metadata {
        for (key, value) in &dataset.metadata {
            println!("{}: {}", key, render_property(value));
        }
        println!();
    }

    let mut rows = vec![[
        "Filename".to_string(),
        "Component".to_string(),
        "Rows".to_string(),
        "Size".to_string(),
    ]];
    rows.push(["--------", "---------", "--------", "----------"].map(String::from));
    for table in dataset.tables() {
        let path = dataset.table_path(table);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| table.url.clone());
        let component = if table.conforms_to.is_some() {
            table.canonical_name.clone()
        } else {
            String::new()
        };
        rows.push([
            filename,
            component,
            table.rows().len().to_string(),
            formatted_size(&path)?,
        ]);
    }
    print_table(&rows);
    Ok(())
}

async fn cmd_createdb(
    metadata: &Path,
    db: &Path,
    overwrite: bool,
    options: &LoadOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if db.exists() && !overwrite {
        return Err(StorageError::AlreadyExists(db.to_path_buf()).into());
    }
    let dataset = load(metadata, options).await?;
    let schema = dataset.schema(options.enforce_constraints)?;

    let mut storage = SqliteStorage::create(db, overwrite)?;

    log_info(format!("Writing {}", db.display()));
    let total = load_schema(&mut storage, &schema)?;
    storage.verify(&schema)?;

    log_success(format!(
        "{} rows in {} tables",
        total,
        storage.table_names()?.len()
    ));
    Ok(())
}

fn cmd_schema(metadata: &Path, options: &LoadOptions) -> Result<(), Box<dyn std::error::Error>> {
    // DDL only; tables are not decoded.
    let dataset = Dataset::from_path(metadata, options)?;
    println!("{}", dataset.schema(options.enforce_constraints)?.ddl);
    Ok(())
}

fn render_property(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print rows as `|`-separated columns; counts and sizes are right-aligned.
fn print_table(rows: &[[String; 4]]) {
    let mut widths = [0usize; 4];
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    for row in rows {
        let line = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, w))| match i {
                0 | 1 => format!("{:<w$}", cell, w = w),
                _ => format!("{:>w$}", cell, w = w),
            })
            .collect::<Vec<_>>()
            .join(" |");
        println!("{}", line.trim_end());
    }
}
