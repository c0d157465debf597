//! CLI commands module
//!
//! Every command reads an exported bundle; nothing here talks to the host.

pub mod catalog;
pub mod layers;
pub mod project;
pub mod snapshot;
pub mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use procontext_storage::BundleStore;
use std::path::{Path, PathBuf};
use tracing::debug;

/// procontext - Query the exported context of an ArcGIS Pro project
#[derive(Debug, Parser)]
#[command(name = "procontext")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory to search for the .arcgispro folder (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub path: Option<PathBuf>,

    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show export status and validate bundle files
    Status(status::StatusArgs),

    /// Show project information
    Project,

    /// List maps
    Maps,

    /// List layers
    Layers(layers::LayersArgs),

    /// Show one layer with its field schema
    Layer(layers::LayerArgs),

    /// List standalone tables
    Tables,

    /// List data connections
    Connections,

    /// List notebooks
    Notebooks,

    /// Print the markdown context summary
    Context,

    /// Print the Mermaid project structure diagram
    Diagram,
}

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct Output {
    pub json: bool,
}

/// Run the CLI application
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let store = open_bundle(cli.path.as_deref())?;
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Status(args) => status::execute(&store, args, &out),
        Commands::Project => project::execute_project(&store, &out),
        Commands::Maps => project::execute_maps(&store, &out),
        Commands::Layers(args) => layers::execute_layers(&store, args, &out),
        Commands::Layer(args) => layers::execute_layer(&store, args, &out),
        Commands::Tables => catalog::execute_tables(&store, &out),
        Commands::Connections => catalog::execute_connections(&store, &out),
        Commands::Notebooks => catalog::execute_notebooks(&store, &out),
        Commands::Context => snapshot::execute_context(&store, &out),
        Commands::Diagram => snapshot::execute_diagram(&store, &out),
    }
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_bundle(path: Option<&Path>) -> Result<BundleStore> {
    let start = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let store = BundleStore::discover(&start).context("Run the Snapshot export from ArcGIS Pro first")?;
    debug!("Using bundle at {}", store.root().display());
    Ok(store)
}

/// Print any serializable value as pretty JSON
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as left-aligned columns under a bold header
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    use colored::Colorize;

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let header = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect::<Vec<_>>()
        .join("  ");
    println!("  {}", header.trim_end().bold());

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}", line.trim_end());
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}

/// `-` for absent values
pub(crate) fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_text() {
        let cmd = Cli::command();
        assert!(cmd.get_about().is_some());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["procontext", "layers", "--map", "Main", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Layers(args) => assert_eq!(args.map.as_deref(), Some("Main")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_pad_and_dash() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("abcdef", 4), "abcdef");
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("")), "-");
        assert_eq!(or_dash(Some("FileGDB")), "FileGDB");
    }
}
