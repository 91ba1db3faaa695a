//! # structdb
//!
//! Inspect and maintain structdb store files without their record types.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use structdb_core::schema::table_name;
use structdb_settings::StructDbSettings;
use structdb_store::{ConnectionOptions, StoreFile};
use tracing::info;

/// structdb store maintenance.
#[derive(Parser, Debug)]
#[command(name = "structdb", about = "Inspect and maintain structdb store files")]
struct Cli {
    /// Settings file (defaults to `~/.structdb/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// List tables with their columns, row count and max row id.
    Inspect {
        /// Store file (defaults to `database.path` from settings).
        path: Option<PathBuf>,
    },
    /// Evict the older half of one table, then compact.
    Evict {
        /// Store file (defaults to `database.path` from settings).
        path: Option<PathBuf>,
        /// Table position.
        #[arg(long)]
        table: usize,
    },
    /// Delete the rows of one table, or of every table, then compact.
    Clear {
        /// Store file (defaults to `database.path` from settings).
        path: Option<PathBuf>,
        /// Table position; all tables when omitted.
        #[arg(long)]
        table: Option<usize>,
    },
    /// Compact the file.
    Vacuum {
        /// Store file (defaults to `database.path` from settings).
        path: Option<PathBuf>,
    },
}

impl Command {
    fn path(&self) -> Option<&Path> {
        match self {
            Self::Inspect { path }
            | Self::Evict { path, .. }
            | Self::Clear { path, .. }
            | Self::Vacuum { path } => path.as_deref(),
        }
    }
}

fn load_settings(config: Option<&Path>) -> Result<StructDbSettings> {
    let settings = match config {
        Some(path) => structdb_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => structdb_settings::load_settings().context("Failed to load settings")?,
    };
    Ok(settings)
}

fn resolve_path(command: &Command, settings: &StructDbSettings) -> Result<PathBuf> {
    if let Some(path) = command.path() {
        return Ok(path.to_path_buf());
    }
    match &settings.database.path {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("No store file given and `database.path` is not set"),
    }
}

fn run(command: &Command, settings: &StructDbSettings, out: &mut impl Write) -> Result<()> {
    let path = resolve_path(command, settings)?;
    let file = StoreFile::open(&path, ConnectionOptions::from_settings(&settings.database))
        .with_context(|| format!("Failed to open {}", path.display()))?;

    match command {
        Command::Inspect { .. } => {
            let layout = file.layout().context("Failed to read layout")?;
            if layout.is_empty() {
                writeln!(out, "{}: no tables", path.display())?;
            }
            for table in &layout {
                let rows = file.row_count(&table.name)?;
                let max_id = file.max_row_id(&table.name)?;
                writeln!(out, "{}  rows={rows} max_row_id={max_id}", table.name)?;
                for column in &table.columns {
                    writeln!(out, "  {:<16} {}", column.name, column.declared_type)?;
                }
            }
        }
        Command::Evict { table, .. } => {
            let name = table_name(*table);
            let deleted = file
                .remove_half(&name)
                .with_context(|| format!("Failed to evict {name}"))?;
            info!(table = %name, deleted, "evicted");
            writeln!(out, "{name}: removed {deleted} rows")?;
        }
        Command::Clear {
            table: Some(table), ..
        } => {
            let name = table_name(*table);
            let deleted = file
                .clear(&name)
                .with_context(|| format!("Failed to clear {name}"))?;
            writeln!(out, "{name}: removed {deleted} rows")?;
        }
        Command::Clear { table: None, .. } => {
            file.clear_all().context("Failed to clear tables")?;
            writeln!(out, "cleared all tables")?;
        }
        Command::Vacuum { .. } => {
            file.vacuum().context("Failed to vacuum")?;
            writeln!(out, "vacuumed {}", path.display())?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    structdb_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    let stdout = std::io::stdout();
    run(&cli.command, &settings, &mut stdout.lock())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
