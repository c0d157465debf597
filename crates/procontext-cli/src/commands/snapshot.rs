//! Context and diagram commands
//!
//! Print the human-facing snapshot documents of a bundle.

use anyhow::{Context, Result};
use procontext_core::export::shared_layer_names;
use procontext_storage::BundleStore;
use serde_json::json;

use super::{print_json, Output};

/// Execute the context command
pub fn execute_context(store: &BundleStore, out: &Output) -> Result<()> {
    if out.json {
        let context = store.load()?;
        return print_json(&context);
    }

    let markdown = store
        .read_markdown()
        .context("No context.md found. Run Snapshot in ArcGIS Pro first")?;
    print!("{}", markdown);
    Ok(())
}

/// Execute the diagram command
pub fn execute_diagram(store: &BundleStore, out: &Output) -> Result<()> {
    let source = store
        .read_diagram()
        .context("Mermaid diagram source not found. Re-run Snapshot in ArcGIS Pro")?;

    if out.json {
        let context = store.load()?;
        return print_json(&json!({
            "source": source,
            "sharedLayers": shared_layer_names(&context),
        }));
    }

    print!("{}", source);
    Ok(())
}
