//! Markdown artifacts: the `context.md` digest and the project-root guide

use super::exporter::{Location, Renderer};
use crate::collector::truncate;
use crate::error::Result;
use crate::model::{ExportContext, LayerInfo};

/// `snapshot/context.md`, a human-readable digest of the context
pub struct ContextMarkdown {
    /// Notebook descriptions are cut to this many characters
    description_limit: usize,
}

impl ContextMarkdown {
    pub fn new() -> Self {
        Self {
            description_limit: 300,
        }
    }

    /// Set the notebook description limit
    pub fn with_description_limit(mut self, limit: usize) -> Self {
        self.description_limit = limit;
        self
    }

    fn render_header(&self, context: &ExportContext) -> String {
        let mut header = String::new();
        header.push_str("# ArcGIS Pro Session Context\n\n");
        header.push_str(&format!(
            "*Exported: {} UTC*\n\n",
            context.meta.exported_at.format("%Y-%m-%d %H:%M:%S")
        ));
        header
    }

    fn render_project(&self, context: &ExportContext) -> String {
        let Some(project) = &context.project else {
            return String::new();
        };

        let mut output = String::new();
        output.push_str("## Project\n\n");
        output.push_str(&format!("- **Name:** {}\n", project.name));
        if let Some(path) = &project.path {
            output.push_str(&format!("- **Path:** `{}`\n", path));
        }
        if let Some(gdb) = &project.default_geodatabase {
            output.push_str(&format!("- **Default Geodatabase:** `{}`\n", gdb));
        }
        output.push_str(&format!("- **Maps:** {}\n", project.map_names.len()));
        output.push_str(&format!("- **Layouts:** {}\n", project.layout_names.len()));
        output.push('\n');
        output
    }

    fn render_maps(&self, context: &ExportContext) -> String {
        if context.maps.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str("## Maps\n\n");
        for map in &context.maps {
            let active = if map.is_active_map { " ⭐ *Active*" } else { "" };
            output.push_str(&format!("### {}{}\n\n", map.name, active));
            output.push_str(&format!("- **Type:** {}\n", map.map_type));
            if let Some(sr) = &map.spatial_reference_name {
                let wkid = map
                    .spatial_reference_wkid
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!("- **Spatial Reference:** {} (WKID: {})\n", sr, wkid));
            }
            output.push_str(&format!("- **Layers:** {}\n", map.layer_count));
            output.push_str(&format!("- **Standalone Tables:** {}\n", map.standalone_table_count));
            if let Some(scale) = map.scale {
                output.push_str(&format!("- **Scale:** 1:{}\n", format_scale(scale)));
            }
            output.push('\n');
        }
        output
    }

    fn render_layers(&self, context: &ExportContext) -> String {
        if context.layers.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str("## Layers\n\n");
        for (map_name, layers) in group_by_map(&context.layers) {
            output.push_str(&format!("### {}\n\n", map_name));
            output.push_str("| Layer | Type | Geometry | Features | Visible |\n");
            output.push_str("|-------|------|----------|----------|---------|\n");
            for layer in layers {
                let broken = if layer.is_broken { " ⚠️" } else { "" };
                let visible = if layer.is_visible { "✅" } else { "❌" };
                output.push_str(&format!(
                    "| {}{} | {} | {} | {} | {} |\n",
                    cell(&layer.name),
                    broken,
                    layer.layer_type,
                    layer.geometry_type.as_deref().unwrap_or("-"),
                    count_or_dash(layer.feature_count),
                    visible
                ));
            }
            output.push('\n');
        }
        output
    }

    fn render_tables(&self, context: &ExportContext) -> String {
        if context.tables.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str("## Standalone Tables\n\n");
        output.push_str("| Table | Rows | Data Source |\n");
        output.push_str("|-------|------|-------------|\n");
        for table in &context.tables {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                cell(&table.name),
                count_or_dash(table.row_count),
                table.data_source_type.as_deref().unwrap_or("-")
            ));
        }
        output.push('\n');
        output
    }

    fn render_layouts(&self, context: &ExportContext) -> String {
        if context.layouts.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str("## Layouts\n\n");
        for layout in &context.layouts {
            output.push_str(&format!("### {}\n\n", layout.name));
            if let (Some(w), Some(h)) = (layout.page_width, layout.page_height) {
                output.push_str(&format!(
                    "- **Size:** {} x {} {}\n",
                    w,
                    h,
                    layout.page_units.as_deref().unwrap_or("")
                ));
            }
            if !layout.map_frame_names.is_empty() {
                output.push_str(&format!("- **Map Frames:** {}\n", layout.map_frame_names.join(", ")));
            }
            output.push('\n');
        }
        output
    }

    fn render_connections(&self, context: &ExportContext) -> String {
        if context.connections.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str("## Data Connections\n\n");
        output.push_str("| Name | Type | Path |\n");
        output.push_str("|------|------|------|\n");
        for conn in &context.connections {
            output.push_str(&format!(
                "| {} | {} | `{}` |\n",
                cell(&conn.name),
                conn.connection_type,
                conn.path.as_deref().unwrap_or("")
            ));
        }
        output.push('\n');
        output
    }

    fn render_notebooks(&self, context: &ExportContext) -> String {
        if context.notebooks.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str("## Notebooks\n\n");
        for notebook in &context.notebooks {
            output.push_str(&format!("### {}\n\n", notebook.name));
            output.push_str(&format!("- **Path:** `{}`\n", notebook.path));

            let breakdown: Vec<String> = notebook
                .cell_breakdown
                .iter()
                .map(|(kind, n)| format!("{} {}", n, kind))
                .collect();
            output.push_str(&format!(
                "- **Cells:** {} ({})\n",
                notebook.cell_count,
                breakdown.join(", ")
            ));
            if let Some(modified) = notebook.last_modified {
                output.push_str(&format!("- **Modified:** {}\n", modified.format("%Y-%m-%d %H:%M")));
            }
            if let Some(description) = notebook.description.as_deref().filter(|d| !d.is_empty()) {
                output.push_str("\n**Description:**\n```\n");
                output.push_str(&truncate(description, self.description_limit));
                output.push_str("\n```\n");
            }
            output.push('\n');
        }
        output
    }
}

impl Default for ContextMarkdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for ContextMarkdown {
    fn render(&self, context: &ExportContext) -> Result<Option<String>> {
        let mut output = String::new();

        output.push_str(&self.render_header(context));
        output.push_str(&self.render_project(context));
        output.push_str(&self.render_maps(context));
        output.push_str(&self.render_layers(context));
        output.push_str(&self.render_tables(context));
        output.push_str(&self.render_layouts(context));
        output.push_str(&self.render_connections(context));
        output.push_str(&self.render_notebooks(context));

        Ok(Some(output))
    }

    fn format_name(&self) -> &str {
        "context-markdown"
    }

    fn location(&self) -> Location {
        Location::Bundle("snapshot/context.md")
    }
}

/// `AGENTS.md` next to the project: how to read the bundle
pub struct AgentsGuide;

impl Renderer for AgentsGuide {
    fn render(&self, context: &ExportContext) -> Result<Option<String>> {
        let timestamp = context.meta.exported_at.format("%Y-%m-%d %H:%M:%S");
        let project = context
            .project
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("(no project open)");

        let mut output = String::new();
        output.push_str("# ArcGIS Pro Session Context\n\n");
        output.push_str(&format!("> **Project:** {}\n", project));
        output.push_str(&format!("> **Snapshot taken:** {} UTC\n", timestamp));
        output.push_str("> **Query it with the read-only `procontext` CLI.**\n\n");

        output.push_str("## Commands\n\n");
        output.push_str("| Command | Shows |\n");
        output.push_str("|---------|-------|\n");
        for (command, purpose) in [
            ("procontext status", "Which export files exist and when they were written"),
            ("procontext project", "Project name, path, default geodatabase"),
            ("procontext maps", "Maps, the active one marked"),
            ("procontext layers", "Layers across all maps"),
            ("procontext layers --broken", "Only layers with broken data sources"),
            ("procontext layer \"Name\"", "One layer with its field schema (partial names work)"),
            ("procontext tables", "Standalone tables"),
            ("procontext connections", "Geodatabase and folder connections"),
            ("procontext notebooks", "Notebooks in the project"),
            ("procontext context", "The full markdown digest"),
            ("procontext diagram", "The Mermaid dependency diagram"),
        ] {
            output.push_str(&format!("| `{}` | {} |\n", command, purpose));
        }
        output.push_str("\nAdd `--json` to any command for structured output.\n\n");

        output.push_str("## Before Relying On It\n\n");
        output.push_str("- The project may have changed since the snapshot time above.\n");
        output.push_str("- Check `isBroken` before assuming a data source is reachable.\n");
        output.push_str("- Counts are as of the snapshot and may be absent for remote sources.\n");
        output.push_str("- Ask for a new snapshot when the user says they changed something.\n\n");

        output.push_str("## Bundle Layout\n\n");
        output.push_str("```\n");
        output.push_str(".arcgispro/\n");
        output.push_str("├── meta.json            # export time, tool version\n");
        output.push_str("├── active_project.txt   # path of the project file\n");
        output.push_str("├── context/             # project, maps, layers, tables,\n");
        output.push_str("│                        # connections, layouts, notebooks (.json)\n");
        output.push_str("├── images/              # map_*.png, layout_*.png\n");
        output.push_str("└── snapshot/\n");
        output.push_str("    ├── context.md\n");
        output.push_str("    ├── project-structure.mmd\n");
        output.push_str("    └── project-structure.md\n");
        output.push_str("```\n");

        Ok(Some(output))
    }

    fn format_name(&self) -> &str {
        "agents-guide"
    }

    fn location(&self) -> Location {
        Location::ProjectRoot("AGENTS.md")
    }
}

/// Layers grouped by owning map, maps in first-seen order
fn group_by_map(layers: &[LayerInfo]) -> Vec<(&str, Vec<&LayerInfo>)> {
    let mut groups: Vec<(&str, Vec<&LayerInfo>)> = Vec::new();
    for layer in layers {
        match groups.iter_mut().find(|(name, _)| *name == layer.map_name) {
            Some((_, members)) => members.push(layer),
            None => groups.push((layer.map_name.as_str(), vec![layer])),
        }
    }
    groups
}

/// Keep table cells on one row
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn count_or_dash(count: Option<u64>) -> String {
    count.map(thousands).unwrap_or_else(|| "-".to_string())
}

/// `1234567` -> `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_scale(scale: f64) -> String {
    if scale.is_finite() && scale >= 0.0 {
        thousands(scale.round() as u64)
    } else {
        scale.to_string()
    }
}
