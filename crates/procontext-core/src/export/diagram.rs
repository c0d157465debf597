//! Mermaid dependency diagram of the project structure
//!
//! Nodes: the project, each map, layout, layer and table. Edges run
//! project to map and layout, map to its top-level layers and tables,
//! group to child layer, and layout to the maps its frames show.
//! A layer name that occurs under more than one map is "shared" and every
//! node carrying it gets the `shared` class.

use super::exporter::{Location, Renderer};
use crate::error::Result;
use crate::model::ExportContext;
use std::collections::{HashMap, HashSet};

/// What a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Project,
    Map,
    Layout,
    Layer,
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Diagram identifier, e.g. `map_0`
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub shared: bool,
    pub broken: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Directed graph built from one context
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Layer names found under more than one map, sorted
    pub shared_layers: Vec<String>,
}

impl DependencyGraph {
    pub fn build(context: &ExportContext) -> Self {
        let shared_layers = shared_layer_names(context);
        let shared: HashSet<&str> = shared_layers.iter().map(String::as_str).collect();
        let mut graph = Self::default();

        let project_id = "project".to_string();
        let project_label = context
            .project
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("Project");
        graph.add(&project_id, project_label, NodeKind::Project, false, false);

        let mut map_ids: HashMap<&str, String> = HashMap::new();
        for (i, map) in context.maps.iter().enumerate() {
            let id = format!("map_{i}");
            graph.add(&id, &map.name, NodeKind::Map, false, false);
            graph.link(&project_id, &id);
            map_ids.insert(map.name.as_str(), id);
        }

        // Layers arrive in tree order, so a child's group is the closest
        // preceding group with that name in the same map
        let mut groups: HashMap<(&str, &str), String> = HashMap::new();
        for (i, layer) in context.layers.iter().enumerate() {
            let id = format!("layer_{i}");
            let is_shared = shared.contains(layer.name.as_str());
            graph.add(&id, &layer.name, NodeKind::Layer, is_shared, layer.is_broken);

            let parent = layer
                .parent_group_layer
                .as_deref()
                .and_then(|g| groups.get(&(layer.map_name.as_str(), g)))
                .or_else(|| map_ids.get(layer.map_name.as_str()));
            if let Some(parent) = parent {
                graph.link(parent, &id);
            }

            if layer.layer_type == "GroupLayer" {
                groups.insert((layer.map_name.as_str(), layer.name.as_str()), id);
            }
        }

        for (i, table) in context.tables.iter().enumerate() {
            let id = format!("table_{i}");
            graph.add(&id, &table.name, NodeKind::Table, false, table.is_broken);
            if let Some(map_id) = map_ids.get(table.map_name.as_str()) {
                graph.link(map_id, &id);
            }
        }

        for (i, layout) in context.layouts.iter().enumerate() {
            let id = format!("layout_{i}");
            graph.add(&id, &layout.name, NodeKind::Layout, false, false);
            graph.link(&project_id, &id);

            let mut linked = HashSet::new();
            for frame in &layout.map_frames {
                let Some(map_id) = frame.map_name.as_deref().and_then(|m| map_ids.get(m)) else {
                    continue;
                };
                if linked.insert(map_id.clone()) {
                    graph.link(&id, map_id);
                }
            }
        }

        graph.shared_layers = shared_layers;
        graph
    }

    fn add(&mut self, id: &str, label: &str, kind: NodeKind, shared: bool, broken: bool) {
        self.nodes.push(Node {
            id: id.to_string(),
            label: label.to_string(),
            kind,
            shared,
            broken,
        });
    }

    fn link(&mut self, from: &str, to: &str) {
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Render as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart LR\n");
        out.push_str("    classDef shared fill:#fff3bf,stroke:#f08c00,stroke-width:2px\n");
        out.push_str("    classDef broken stroke:#e03131,stroke-dasharray:4 3\n");

        for node in &self.nodes {
            let label = escape_label(&node.label);
            let shape = match node.kind {
                NodeKind::Project => format!("[[\"{label}\"]]"),
                NodeKind::Map => format!("[\"{label}\"]"),
                NodeKind::Layout => format!("[/\"{label}\"/]"),
                NodeKind::Layer => format!("(\"{label}\")"),
                NodeKind::Table => format!("[(\"{label}\")]"),
            };
            out.push_str(&format!("    {}{}\n", node.id, shape));
        }

        for edge in &self.edges {
            out.push_str(&format!("    {} --> {}\n", edge.from, edge.to));
        }

        for (class, ids) in [
            ("shared", self.ids_where(|n| n.shared)),
            ("broken", self.ids_where(|n| n.broken)),
        ] {
            if !ids.is_empty() {
                out.push_str(&format!("    class {} {}\n", ids.join(","), class));
            }
        }
        out
    }

    fn ids_where(&self, pred: impl Fn(&Node) -> bool) -> Vec<&str> {
        self.nodes.iter().filter(|n| pred(n)).map(|n| n.id.as_str()).collect()
    }
}

/// Layer names present under two or more distinct maps
pub fn shared_layer_names(context: &ExportContext) -> Vec<String> {
    let mut maps_by_name: HashMap<&str, HashSet<&str>> = HashMap::new();
    for layer in &context.layers {
        maps_by_name
            .entry(layer.name.as_str())
            .or_default()
            .insert(layer.map_name.as_str());
    }
    let mut names: Vec<String> = maps_by_name
        .into_iter()
        .filter(|(_, maps)| maps.len() > 1)
        .map(|(name, _)| name.to_string())
        .collect();
    names.sort();
    names
}

/// Neutralize characters that would end or break a quoted Mermaid label
pub fn escape_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut chars = label.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => out.push_str("#quot;"),
            '[' => out.push_str("#91;"),
            ']' => out.push_str("#93;"),
            '{' => out.push_str("#123;"),
            '}' => out.push_str("#125;"),
            '<' => out.push_str("#lt;"),
            '>' => out.push_str("#gt;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '\n' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

/// `snapshot/project-structure.mmd`
pub struct DiagramSource;

impl Renderer for DiagramSource {
    fn render(&self, context: &ExportContext) -> Result<Option<String>> {
        Ok(Some(DependencyGraph::build(context).to_mermaid()))
    }

    fn format_name(&self) -> &str {
        "diagram-source"
    }

    fn location(&self) -> Location {
        Location::Bundle("snapshot/project-structure.mmd")
    }
}

/// `snapshot/project-structure.md`: the diagram embedded in markdown
pub struct DiagramDocument;

impl Renderer for DiagramDocument {
    fn render(&self, context: &ExportContext) -> Result<Option<String>> {
        let graph = DependencyGraph::build(context);

        let mut output = String::new();
        output.push_str("# Project Structure\n\n");
        output.push_str(&format!(
            "*Exported: {} UTC*\n\n",
            context.meta.exported_at.format("%Y-%m-%d %H:%M:%S")
        ));
        output.push_str("```mermaid\n");
        output.push_str(&graph.to_mermaid());
        output.push_str("```\n");

        if !graph.shared_layers.is_empty() {
            output.push_str("\n## Shared Layers\n\n");
            output.push_str("Layer names that appear in more than one map:\n\n");
            for name in &graph.shared_layers {
                output.push_str(&format!("- {}\n", name));
            }
        }

        Ok(Some(output))
    }

    fn format_name(&self) -> &str {
        "diagram-document"
    }

    fn location(&self) -> Location {
        Location::Bundle("snapshot/project-structure.md")
    }
}
