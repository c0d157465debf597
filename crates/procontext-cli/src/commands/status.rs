//! Status command
//!
//! Validate the files of a bundle and report what is missing.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use procontext_storage::{BundleStore, FileState};

use super::{print_json, Output};

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Exit with an error if problems are detected
    #[arg(long)]
    pub strict: bool,
}

/// Execute the status command
pub fn execute(store: &BundleStore, args: StatusArgs, out: &Output) -> Result<()> {
    use colored::Colorize;

    let status = store.status();

    if out.json {
        print_json(&status)?;
    } else {
        println!();
        println!("{}", "Export Status".bold());
        println!("  Location: {}", status.location.display());

        match status.exported_at {
            Some(at) => {
                let hours = (Utc::now() - at).num_minutes() as f64 / 60.0;
                let age = if hours > 24.0 {
                    format!("~{:.1} days ago", hours / 24.0)
                } else {
                    format!("~{:.1} hours ago", hours)
                };
                println!("  Exported: {}  {}", at.format("%Y-%m-%d %H:%M:%S UTC"), age.dimmed());
            }
            None => println!("  Exported: {}", "Unknown (meta.json missing/unreadable)".yellow()),
        }
        println!();

        println!("{}", "Context files:".bold());
        for file in &status.files {
            match file.state {
                FileState::Ok { items: Some(n) } => println!("  {} {} ({} items)", "✓".green(), file.name, n),
                FileState::Ok { items: None } => println!("  {} {}", "✓".green(), file.name),
                state => println!("  {} {} ({})", "✗".red(), file.name, state.label()),
            }
        }
        if status.markdown {
            println!("  {} snapshot/context.md", "✓".green());
        } else {
            println!("  {} snapshot/context.md (missing)", "•".yellow());
        }
        println!();

        println!("{} {}", "Images:".bold(), status.images.len());
        for name in &status.images {
            println!("  {}", name);
        }
        println!();

        if status.ok() {
            println!(
                "{} {}/{} files ok",
                "✓".green(),
                status.ok_files(),
                status.files.len()
            );
        } else {
            println!("{}", "Problems:".bold());
            for problem in &status.problems {
                println!("  {} {}", "⚠".yellow(), problem);
            }
        }
    }

    if args.strict && !status.ok() {
        bail!("{} problem(s) detected", status.problems.len());
    }
    Ok(())
}
