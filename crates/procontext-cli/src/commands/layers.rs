//! Layers and layer commands

use anyhow::{bail, Result};
use clap::Args;
use procontext_core::export::thousands;
use procontext_core::model::LayerInfo;
use procontext_storage::BundleStore;

use super::{or_dash, print_json, print_table, Output};

/// Arguments for the layers command
#[derive(Debug, Args)]
pub struct LayersArgs {
    /// Only layers of this map
    #[arg(short, long)]
    pub map: Option<String>,

    /// Only layers with a broken data source
    #[arg(long)]
    pub broken: bool,
}

/// Arguments for the layer command
#[derive(Debug, Args)]
pub struct LayerArgs {
    /// Layer name; a unique partial match is accepted
    pub name: String,
}

/// Execute the layers command
pub fn execute_layers(store: &BundleStore, args: LayersArgs, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;
    let layers = filter_layers(&context.layers, args.map.as_deref(), args.broken);

    if out.json {
        return print_json(&layers);
    }

    if layers.is_empty() {
        let msg = if args.broken {
            "No broken layers found"
        } else {
            "No layers found"
        };
        println!("{}", msg.yellow());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = layers
        .iter()
        .map(|layer| {
            let broken = if layer.is_broken { " ⚠" } else { "" };
            vec![
                format!("{}{}", layer.name, broken),
                layer.map_name.clone(),
                layer.layer_type.clone(),
                or_dash(layer.geometry_type.as_deref()),
                layer.feature_count.map(thousands).unwrap_or_else(|| "-".to_string()),
                if layer.is_visible { "✓" } else { "" }.to_string(),
            ]
        })
        .collect();

    println!();
    print_table(&["Layer", "Map", "Type", "Geometry", "Features", "V"], &rows);
    println!();
    Ok(())
}

/// Execute the layer command
pub fn execute_layer(store: &BundleStore, args: LayerArgs, out: &Output) -> Result<()> {
    use colored::Colorize;

    let context = store.load()?;
    let matches = find_layer(&context.layers, &args.name)?;
    let layer = matches[0];

    if out.json {
        return print_json(layer);
    }

    let mut maps: Vec<&str> = Vec::new();
    for m in &matches {
        if !maps.contains(&m.map_name.as_str()) {
            maps.push(&m.map_name);
        }
    }

    println!();
    println!("{} {}", "Layer:".bold(), layer.name.bold());
    if maps.len() == 1 {
        println!("  Map: {}", maps[0]);
    } else {
        println!("  Maps: {}", maps.join(", "));
    }
    println!("  Type: {}", layer.layer_type);
    println!("  Geometry: {}", or_dash(layer.geometry_type.as_deref()));
    println!("  Visible: {}", yes_no(layer.is_visible));
    println!("  Editable: {}", yes_no(layer.is_editable));
    if let Some(group) = &layer.parent_group_layer {
        println!("  Group: {}", group);
    }
    if layer.is_broken {
        println!("  {}", "⚠ Data source is BROKEN".red());
    }
    if let Some(count) = layer.feature_count {
        println!("  Features: {}", thousands(count));
    }
    if let Some(selected) = layer.selection_count.filter(|n| *n > 0) {
        println!("  Selected: {}", thousands(selected));
    }
    if let Some(path) = &layer.data_source_path {
        println!("  Source: {}", path.dimmed());
    }
    if let Some(query) = &layer.definition_query {
        println!("  Definition Query: {}", query);
    }
    if let Some(renderer) = &layer.renderer_type {
        println!("  Renderer: {}", renderer);
        if let Some(field) = &layer.renderer_field {
            println!("  Renderer Field: {}", field);
        }
    }

    if !layer.fields.is_empty() {
        println!();
        println!("{}", format!("Fields ({}):", layer.fields.len()).bold());
        let rows: Vec<Vec<String>> = layer
            .fields
            .iter()
            .map(|f| {
                vec![
                    f.name.clone(),
                    f.alias
                        .as_deref()
                        .filter(|a| *a != f.name)
                        .unwrap_or("-")
                        .to_string(),
                    f.field_type.clone(),
                    f.length.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string()),
                    if f.is_nullable { "✓" } else { "" }.to_string(),
                    or_dash(f.domain_name.as_deref()),
                ]
            })
            .collect();
        print_table(&["Name", "Alias", "Type", "Length", "Null", "Domain"], &rows);
    }
    println!();
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Layers of `map` (case-insensitive), optionally only broken ones
pub fn filter_layers<'a>(layers: &'a [LayerInfo], map: Option<&str>, broken_only: bool) -> Vec<&'a LayerInfo> {
    layers
        .iter()
        .filter(|l| map.map_or(true, |m| l.map_name.eq_ignore_ascii_case(m.trim())))
        .filter(|l| !broken_only || l.is_broken)
        .collect()
}

/// Resolve a layer name to every entry of that one logical layer.
///
/// Exact case-insensitive matches win over partial ones. The same name in
/// several maps is one logical layer; several distinct names is an error.
pub fn find_layer<'a>(layers: &'a [LayerInfo], name: &str) -> Result<Vec<&'a LayerInfo>> {
    let needle = name.trim().to_lowercase();
    let mut matches: Vec<&LayerInfo> = layers
        .iter()
        .filter(|l| l.name.to_lowercase().contains(&needle))
        .collect();

    if matches.is_empty() {
        bail!("Layer '{}' not found", name);
    }

    let exact: Vec<&LayerInfo> = matches
        .iter()
        .copied()
        .filter(|l| l.name.to_lowercase() == needle)
        .collect();
    if !exact.is_empty() {
        matches = exact;
    }

    let mut distinct: Vec<String> = matches.iter().map(|l| l.name.to_lowercase()).collect();
    distinct.sort();
    distinct.dedup();
    if distinct.len() > 1 {
        let candidates = matches
            .iter()
            .map(|l| format!("{} ({})", l.name, l.map_name))
            .collect::<Vec<_>>()
            .join(", ");
        bail!(
            "Multiple layers match '{}': {}. Be more specific.",
            name,
            candidates
        );
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, map: &str, broken: bool) -> LayerInfo {
        LayerInfo {
            name: name.to_string(),
            map_name: map.to_string(),
            layer_type: "FeatureLayer".to_string(),
            is_broken: broken,
            ..Default::default()
        }
    }

    fn layers() -> Vec<LayerInfo> {
        vec![
            layer("Roads", "Main", false),
            layer("Roads", "Overview", false),
            layer("Road Centerlines", "Main", true),
            layer("Parcels", "Main", false),
        ]
    }

    #[test]
    fn test_exact_match_wins() {
        let layers = layers();
        let found = find_layer(&layers, "roads").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|l| l.name == "Roads"));
    }

    #[test]
    fn test_unique_partial_match() {
        let layers = layers();
        let found = find_layer(&layers, "parc").unwrap();
        assert_eq!(found[0].name, "Parcels");
    }

    #[test]
    fn test_ambiguous_partial_match() {
        let layers = layers();
        let err = find_layer(&layers, "road").unwrap_err().to_string();
        assert!(err.contains("Multiple layers match 'road'"));
        assert!(err.contains("Road Centerlines (Main)"));
    }

    #[test]
    fn test_not_found() {
        let layers = layers();
        let err = find_layer(&layers, "Hydrants").unwrap_err();
        assert_eq!(err.to_string(), "Layer 'Hydrants' not found");
    }

    #[test]
    fn test_filter_layers() {
        let layers = layers();
        assert_eq!(filter_layers(&layers, Some("main"), false).len(), 3);
        assert_eq!(filter_layers(&layers, None, true).len(), 1);
        assert_eq!(filter_layers(&layers, Some("Overview"), true).len(), 0);
    }
}
