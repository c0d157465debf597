//! Tables, connections and notebooks commands

use anyhow::Result;
use procontext_core::export::thousands;
use procontext_storage::BundleStore;

use super::{or_dash, print_json, print_table, Output};

const NOTEBOOK_SUMMARY_LEN: usize = 60;

/// Execute the tables command
pub fn execute_tables(store: &BundleStore, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;
    if out.json {
        return print_json(&context.tables);
    }
    if context.tables.is_empty() {
        println!("{}", "No standalone tables found".yellow());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = context
        .tables
        .iter()
        .map(|t| {
            let broken = if t.is_broken { " ⚠" } else { "" };
            vec![
                format!("{}{}", t.name, broken),
                t.map_name.clone(),
                t.row_count.map(thousands).unwrap_or_else(|| "-".to_string()),
                or_dash(t.data_source_type.as_deref()),
            ]
        })
        .collect();

    println!();
    print_table(&["Table", "Map", "Rows", "Source Type"], &rows);
    println!();
    Ok(())
}

/// Execute the connections command
pub fn execute_connections(store: &BundleStore, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;
    if out.json {
        return print_json(&context.connections);
    }
    if context.connections.is_empty() {
        println!("{}", "No connections found".yellow());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = context
        .connections
        .iter()
        .map(|c| vec![c.name.clone(), c.connection_type.clone(), or_dash(c.path.as_deref())])
        .collect();

    println!();
    print_table(&["Name", "Type", "Path"], &rows);
    println!();
    Ok(())
}

/// Execute the notebooks command
pub fn execute_notebooks(store: &BundleStore, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;
    if out.json {
        return print_json(&context.notebooks);
    }
    if context.notebooks.is_empty() {
        println!("{}", "No notebooks found".yellow());
        return Ok(());
    }

    println!();
    for notebook in &context.notebooks {
        println!("{}", notebook.name.bold());
        println!("  Path: {}", notebook.path.dimmed());
        let breakdown = notebook
            .cell_breakdown
            .iter()
            .map(|(kind, n)| format!("{} {}", n, kind))
            .collect::<Vec<_>>()
            .join(", ");
        if breakdown.is_empty() {
            println!("  Cells: {}", notebook.cell_count);
        } else {
            println!("  Cells: {} ({})", notebook.cell_count, breakdown);
        }
        if let Some(description) = &notebook.description {
            println!("  {}", summary_line(description));
        }
        println!();
    }
    Ok(())
}

/// First line of a description, shortened for one-line display
fn summary_line(description: &str) -> String {
    let line = description.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= NOTEBOOK_SUMMARY_LEN {
        return line.to_string();
    }
    let cut: String = line.chars().take(NOTEBOOK_SUMMARY_LEN - 3).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        assert_eq!(summary_line("\n# Parcel audit\nmore"), "# Parcel audit");
        let long = "x".repeat(100);
        let line = summary_line(&long);
        assert_eq!(line.chars().count(), NOTEBOOK_SUMMARY_LEN);
        assert!(line.ends_with("..."));
    }
}
