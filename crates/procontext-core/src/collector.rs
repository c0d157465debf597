//! Walks the host object model and builds an [`ExportContext`]
//!
//! Everything here runs on the host thread, inside one [`HostQueue`] job.
//! Per-field lookups are best-effort: a failure is recorded as a
//! [`DegradedField`] and the field collapses to `None` or empty. Only the
//! project lookup, the map enumeration and cancellation abort a run.
//!
//! [`HostQueue`]: crate::source::HostQueue

use crate::config::ExportOptions;
use crate::error::{ProContextError, Result};
use crate::geometry;
use crate::model::*;
use crate::source::{
    ActiveView, HostField, HostLayer, HostLayout, HostMap, HostResult, HostRow, HostValue,
    LayerKind, ProjectItem, SourceAdapter, SourceRef,
};
use crate::stable_id;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Maximum description length, including the trailing `...`
pub const DESCRIPTION_LIMIT: usize = 500;

/// A field that could not be read and was left empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedField {
    /// What was being collected, e.g. `Main/Roads`
    pub subject: String,
    /// Output field name, e.g. `featureCount`
    pub field: &'static str,
    pub reason: String,
}

/// A collected context plus the fields that degraded along the way
#[derive(Debug, Clone)]
pub struct Collection {
    pub context: ExportContext,
    pub degraded: Vec<DegradedField>,
}

/// Collect a context stamped with the current time
pub fn collect(
    source: &dyn SourceAdapter,
    options: &ExportOptions,
    cancel: &CancellationToken,
) -> Result<ExportContext> {
    Ok(collect_report(source, options, cancel, Meta::default())?.context)
}

/// Collect a context with the given metadata and keep the degradation report
pub fn collect_report(
    source: &dyn SourceAdapter,
    options: &ExportOptions,
    cancel: &CancellationToken,
    meta: Meta,
) -> Result<Collection> {
    Collector {
        source,
        options,
        cancel,
        degraded: Vec::new(),
    }
    .run(meta)
}

struct Collector<'a> {
    source: &'a dyn SourceAdapter,
    options: &'a ExportOptions,
    cancel: &'a CancellationToken,
    degraded: Vec<DegradedField>,
}

impl<'a> Collector<'a> {
    fn run(mut self, meta: Meta) -> Result<Collection> {
        let source = self.source;
        let mut context = ExportContext::empty(meta);

        let Some(project) = source.project()? else {
            debug!("No project open, returning metadata only");
            return Ok(self.finish(context));
        };

        let map_names = source.map_names()?;
        let layout_names = self
            .probe("project", "layoutNames", source.layout_names())
            .unwrap_or_default();
        let active = self
            .probe("project", "activeView", source.active_view())
            .flatten();
        let active_map = active.as_ref().map(|v| v.map_name.as_str());

        let project_path = project.path.clone();
        context.project = Some(ProjectInfo {
            name: project.name,
            path: project.path,
            default_geodatabase: project.default_geodatabase,
            default_toolbox: project.default_toolbox,
            map_names: map_names.clone(),
            layout_names: layout_names.clone(),
        });

        for name in &map_names {
            self.check_cancelled()?;
            if !self.options.map_filter.accepts(name, active_map) {
                debug!("Map '{}' filtered out", name);
                continue;
            }
            let Some(map) = self.probe(name, "map", source.map(name)).flatten() else {
                continue;
            };

            let map_info = map_info(&map, project_path.as_deref(), active.as_ref());
            context.maps.push(map_info);
            let layers = self.layers(&map.name, project_path.as_deref());
            context.layers.extend(layers);
            let tables = self.tables(&map.name, project_path.as_deref());
            context.tables.extend(tables);
        }

        for name in &layout_names {
            self.check_cancelled()?;
            if let Some(layout) = self.probe(name, "layout", source.layout(name)).flatten() {
                context.layouts.push(layout_info(layout));
            }
        }

        let items = self
            .probe("project", "items", source.project_items())
            .unwrap_or_default();
        context.connections = connections(&items);
        if self.options.export_notebooks {
            context.notebooks = notebooks(&items);
        }

        info!(
            "Collected {} maps, {} layers, {} tables, {} layouts",
            context.maps.len(),
            context.layers.len(),
            context.tables.len(),
            context.layouts.len()
        );
        Ok(self.finish(context))
    }

    fn finish(self, context: ExportContext) -> Collection {
        Collection {
            context,
            degraded: self.degraded,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ProContextError::Cancelled);
        }
        Ok(())
    }

    /// Collapse a host result to `Option`, recording the failure
    fn probe<T>(&mut self, subject: &str, field: &'static str, result: HostResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("{} of {} unavailable: {}", field, subject, e);
                self.degraded.push(DegradedField {
                    subject: subject.to_string(),
                    field,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn layers(&mut self, map_name: &str, project_path: Option<&str>) -> Vec<LayerInfo> {
        let source = self.source;
        let Some(layers) = self.probe(map_name, "layers", source.layers(map_name)) else {
            return Vec::new();
        };
        let by_key: HashMap<&str, &HostLayer> = layers.iter().map(|l| (l.key.as_str(), l)).collect();

        layers
            .iter()
            .map(|layer| self.layer(map_name, project_path, layer, &by_key))
            .collect()
    }

    fn layer(
        &mut self,
        map_name: &str,
        project_path: Option<&str>,
        layer: &HostLayer,
        by_key: &HashMap<&str, &HostLayer>,
    ) -> LayerInfo {
        let source = self.source;
        let subject = format!("{}/{}", map_name, layer.name);
        let at = SourceRef::new(map_name, layer.key.clone());
        let ancestors = group_ancestors(layer, by_key);

        let mut info = LayerInfo {
            name: layer.name.clone(),
            map_name: map_name.to_string(),
            layer_type: layer.kind.tag().to_string(),
            is_visible: layer.visible,
            is_broken: !layer.connected,
            parent_group_layer: ancestors.last().map(|s| s.to_string()),
            ..Default::default()
        };

        if layer.kind != LayerKind::Group {
            if let Some(ds) = self.probe(&subject, "dataSourcePath", source.data_source(&at)).flatten() {
                info.data_source_path = ds.path;
                info.data_source_type = Some(ds.kind);
            }
        }

        if layer.kind == LayerKind::Feature {
            info.is_editable = layer.editable;
            info.definition_query = layer.definition_query.clone();
            info.geometry_type = layer.geometry_type.clone();
            info.feature_count = self.probe(&subject, "featureCount", source.row_count(&at));
            info.selection_count = self.probe(&subject, "selectionCount", source.selection_count(&at));
            if let Some(renderer) = self.probe(&subject, "rendererType", source.renderer(&at)).flatten() {
                info.renderer_type = Some(renderer.kind);
                info.renderer_field = renderer.field;
            }
            if self.options.export_fields {
                info.fields = self.fields(&subject, &at);
            }
            if self.options.sample_row_count > 0 {
                info.sample_data = self
                    .probe(&subject, "sampleData", source.rows(&at, self.options.sample_row_count))
                    .map(|rows| rows.iter().map(|r| sample_row(r, true)).collect())
                    .unwrap_or_default();
            }
        }

        let mut structural = ancestors.join("/");
        if info.data_source_path.is_none() {
            if !structural.is_empty() {
                structural.push('/');
            }
            structural.push_str(&layer.name);
        }
        info.id = stable_id::for_layer(
            project_path,
            map_name,
            &structural,
            info.data_source_path.as_deref(),
            &info.layer_type,
        );
        info
    }

    fn tables(&mut self, map_name: &str, project_path: Option<&str>) -> Vec<TableInfo> {
        let source = self.source;
        let Some(tables) = self.probe(map_name, "tables", source.standalone_tables(map_name)) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(tables.len());
        for table in tables {
            let subject = format!("{}/{}", map_name, table.name);
            let at = SourceRef::new(map_name, table.key.clone());

            let mut info = TableInfo {
                name: table.name.clone(),
                map_name: map_name.to_string(),
                is_broken: !table.connected,
                definition_query: table.definition_query.clone(),
                ..Default::default()
            };
            if let Some(ds) = self.probe(&subject, "dataSourcePath", source.data_source(&at)).flatten() {
                info.data_source_path = ds.path;
                info.data_source_type = Some(ds.kind);
            }
            info.row_count = self.probe(&subject, "rowCount", source.row_count(&at));
            if self.options.export_fields {
                info.fields = self.fields(&subject, &at);
            }
            if self.options.sample_row_count > 0 {
                info.sample_data = self
                    .probe(&subject, "sampleData", source.rows(&at, self.options.sample_row_count))
                    .map(|rows| rows.iter().map(|r| sample_row(r, false)).collect())
                    .unwrap_or_default();
            }

            info.id = stable_id::for_table(
                project_path,
                map_name,
                &info.name,
                info.data_source_path.as_deref(),
                info.data_source_type.as_deref(),
            );
            out.push(info);
        }
        out
    }

    fn fields(&mut self, subject: &str, at: &SourceRef) -> Vec<FieldInfo> {
        let source = self.source;
        let Some(fields) = self.probe(subject, "fields", source.fields(at)) else {
            return Vec::new();
        };
        fields
            .into_iter()
            .map(|f| {
                let domain_name = self
                    .probe(subject, "domainName", source.field_domain(at, &f.name))
                    .flatten();
                field_info(f, domain_name)
            })
            .collect()
    }
}

/// Names of the enclosing group layers, outermost first
fn group_ancestors<'l>(layer: &HostLayer, by_key: &HashMap<&str, &'l HostLayer>) -> Vec<&'l str> {
    let mut chain = Vec::new();
    let mut parent = layer.parent_key.as_deref();
    while let Some(key) = parent {
        // Bounded by the layer count in case the host reports a cycle
        if chain.len() > by_key.len() {
            break;
        }
        let Some(&group) = by_key.get(key) else { break };
        chain.push(group.name.as_str());
        parent = group.parent_key.as_deref();
    }
    chain.reverse();
    chain
}

fn map_info(map: &HostMap, project_path: Option<&str>, active: Option<&ActiveView>) -> MapInfo {
    let active = active.filter(|v| v.map_name == map.name);
    MapInfo {
        id: stable_id::for_map(project_path, &map.name, map.kind.as_str()),
        name: map.name.clone(),
        map_type: map.kind,
        spatial_reference_name: map.spatial_reference.as_ref().map(|sr| sr.name.clone()),
        spatial_reference_wkid: map.spatial_reference.as_ref().and_then(|sr| sr.wkid),
        layer_count: map.layer_count,
        standalone_table_count: map.table_count,
        extent: active.and_then(|v| v.extent),
        scale: active.and_then(|v| v.scale),
        is_active_map: active.is_some(),
    }
}

fn field_info(field: HostField, domain_name: Option<String>) -> FieldInfo {
    FieldInfo {
        name: field.name,
        alias: field.alias,
        field_type: field.field_type,
        length: field.length,
        is_nullable: field.nullable,
        is_editable: field.editable,
        domain_name,
    }
}

fn layout_info(layout: HostLayout) -> LayoutInfo {
    let map_frames: Vec<MapFrameInfo> = layout
        .frames
        .into_iter()
        .map(|f| MapFrameInfo {
            name: f.name,
            map_name: f.map_name,
        })
        .collect();
    LayoutInfo {
        name: layout.name,
        page_width: layout.page.as_ref().map(|p| p.width),
        page_height: layout.page.as_ref().map(|p| p.height),
        page_units: layout.page.map(|p| p.units),
        map_frame_names: map_frames.iter().map(|f| f.name.clone()).collect(),
        map_frames,
    }
}

/// Convert one cursor row; layers drop the `Shape` attribute and carry GeoJSON
fn sample_row(row: &HostRow, with_geometry: bool) -> SampleRow {
    let attributes = row
        .values
        .iter()
        .filter(|(name, _)| !(with_geometry && name.eq_ignore_ascii_case("Shape")))
        .map(|(name, value)| (name.clone(), json_value(value)))
        .collect();
    SampleRow {
        attributes,
        geometry: if with_geometry {
            geometry::to_geojson(row.shape.as_ref())
        } else {
            None
        },
    }
}

/// JSON-safe form of an attribute value
pub fn json_value(value: &HostValue) -> Value {
    match value {
        HostValue::Null => Value::Null,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Int(i) => Value::from(*i),
        HostValue::Float(f) => Value::from(*f),
        HostValue::Text(s) => Value::String(s.clone()),
        HostValue::Date(d) => Value::String(d.to_rfc3339()),
        HostValue::Guid(g) => Value::String(g.to_string()),
        HostValue::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

fn connections(items: &[ProjectItem]) -> Vec<ConnectionInfo> {
    items
        .iter()
        .filter_map(|item| {
            let connection_type = match item.type_id.as_str() {
                "database_geodb" => "Geodatabase",
                "folder_conn" => "Folder",
                _ => return None,
            };
            Some(ConnectionInfo {
                name: item.name.clone(),
                connection_type: connection_type.to_string(),
                path: item.path.clone(),
            })
        })
        .collect()
}

fn is_notebook(item: &ProjectItem) -> bool {
    let Some(path) = item.path.as_deref() else {
        return false;
    };
    path.to_ascii_lowercase().ends_with(".ipynb") || item.type_id.to_ascii_lowercase().contains("notebook")
}

fn notebooks(items: &[ProjectItem]) -> Vec<NotebookInfo> {
    items
        .iter()
        .filter(|item| is_notebook(item))
        .filter_map(|item| item.path.as_deref().map(|path| read_notebook(&item.name, Path::new(path))))
        .collect()
}

/// Summarize a notebook file. Unreadable files keep only name and path.
pub fn read_notebook(name: &str, path: &Path) -> NotebookInfo {
    let mut info = NotebookInfo {
        name: name.to_string(),
        path: path.display().to_string(),
        ..Default::default()
    };

    let Ok(metadata) = fs::metadata(path) else {
        debug!("Notebook {} not found", path.display());
        return info;
    };
    info.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    let parsed = fs::read_to_string(path)
        .map_err(ProContextError::from)
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(ProContextError::from));
    match parsed {
        Ok(document) => summarize_notebook(&document, &mut info),
        Err(e) => debug!("Failed to parse notebook {}: {}", path.display(), e),
    }
    info
}

/// Fill cell counts and description from a parsed notebook document
pub fn summarize_notebook(document: &Value, info: &mut NotebookInfo) {
    let Some(cells) = document.get("cells").and_then(Value::as_array) else {
        return;
    };
    info.cell_count = cells.len();

    let mut breakdown = BTreeMap::new();
    let mut first_markdown = None;
    let mut first_code = None;
    for cell in cells {
        let Some(cell_type) = cell.get("cell_type") else {
            continue;
        };
        let cell_type = cell_type.as_str().unwrap_or("unknown");
        *breakdown.entry(cell_type.to_string()).or_insert(0) += 1;

        let Some(content) = cell.get("source").and_then(cell_source) else {
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }
        match cell_type {
            "markdown" if first_markdown.is_none() => first_markdown = Some(content),
            "code" if first_code.is_none() => first_code = Some(content),
            _ => {}
        }
    }

    info.cell_breakdown = breakdown;
    info.description = first_markdown.or(first_code).map(|d| truncate(&d, DESCRIPTION_LIMIT));
}

/// Cell source is either a string or an array of line strings
fn cell_source(source: &Value) -> Option<String> {
    match source {
        Value::String(s) => Some(s.clone()),
        Value::Array(lines) => Some(lines.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

/// Cut to `limit` characters, the last three being `...`
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
