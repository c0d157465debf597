//! Project and maps commands

use anyhow::{bail, Result};
use procontext_core::export::thousands;
use procontext_storage::BundleStore;

use super::{or_dash, print_json, Output};

/// Execute the project command
pub fn execute_project(store: &BundleStore, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;
    let Some(project) = context.project else {
        bail!("No project info found in {}", store.root().display());
    };

    if out.json {
        return print_json(&project);
    }

    println!();
    println!("{} {}", "Project:".bold(), project.name.bold());
    println!("  Path: {}", or_dash(project.path.as_deref()).dimmed());
    println!("  Default GDB: {}", or_dash(project.default_geodatabase.as_deref()).dimmed());
    println!("  Default Toolbox: {}", or_dash(project.default_toolbox.as_deref()).dimmed());
    println!("  Maps: {}", project.map_names.len());
    println!("  Layouts: {}", project.layout_names.len());
    println!(
        "  Exported: {}",
        context.meta.exported_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    Ok(())
}

/// Execute the maps command
pub fn execute_maps(store: &BundleStore, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;

    if out.json {
        return print_json(&context.maps);
    }

    if context.maps.is_empty() {
        println!("{}", "No maps found".yellow());
        return Ok(());
    }

    println!();
    for map in &context.maps {
        let active = if map.is_active_map {
            format!(" {}", "★ Active".green())
        } else {
            String::new()
        };
        println!("{}{}", map.name.bold(), active);
        println!(
            "  Type: {} | SR: {}",
            map.map_type,
            or_dash(map.spatial_reference_name.as_deref())
        );
        println!(
            "  Layers: {} | Tables: {}",
            map.layer_count, map.standalone_table_count
        );
        if let Some(scale) = map.scale {
            println!("  Scale: 1:{}", thousands(scale.round().max(0.0) as u64));
        }
        println!();
    }
    Ok(())
}
