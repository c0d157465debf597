//! In-memory host for tests and offline runs

use super::adapter::*;
use crate::model::{ExtentInfo, MapKind};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// A per-source query that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    DataSource,
    Fields,
    Domain,
    RowCount,
    Selection,
    Renderer,
    Rows,
}

/// Everything the host knows about one layer or table
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub data_source: Option<DataSource>,
    pub fields: Vec<HostField>,
    /// Field name to domain name
    pub domains: HashMap<String, String>,
    pub row_count: u64,
    pub selection_count: u64,
    pub renderer: Option<Renderer>,
    pub rows: Vec<HostRow>,
}

impl SourceData {
    pub fn at(path: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            data_source: Some(DataSource {
                path: Some(path.into()),
                kind: kind.into(),
            }),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<HostField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_rows(mut self, rows: Vec<HostRow>) -> Self {
        self.row_count = self.row_count.max(rows.len() as u64);
        self.rows = rows;
        self
    }

    pub fn with_counts(mut self, rows: u64, selected: u64) -> Self {
        self.row_count = rows;
        self.selection_count = selected;
        self
    }

    pub fn with_renderer(mut self, kind: impl Into<String>, field: Option<&str>) -> Self {
        self.renderer = Some(Renderer {
            kind: kind.into(),
            field: field.map(str::to_string),
        });
        self
    }

    pub fn with_domain(mut self, field: impl Into<String>, domain: impl Into<String>) -> Self {
        self.domains.insert(field.into(), domain.into());
        self
    }
}

#[derive(Debug, Clone)]
struct MemoryMap {
    info: HostMap,
    layers: Vec<HostLayer>,
    tables: Vec<HostTable>,
}

/// A host backed by plain data, built up with `with_*` calls
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    project: Option<HostProject>,
    maps: Vec<MemoryMap>,
    layouts: Vec<HostLayout>,
    active: Option<ActiveView>,
    items: Vec<ProjectItem>,
    sources: HashMap<SourceRef, SourceData>,
    faults: HashSet<(SourceRef, Probe)>,
    broken_maps: HashSet<String>,
    render_faults: HashSet<String>,
    map_delay: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: HostProject) -> Self {
        self.project = Some(project);
        self
    }

    /// Add an empty 2D map
    pub fn with_map(self, name: &str) -> Self {
        self.with_map_info(HostMap {
            name: name.to_string(),
            kind: MapKind::TwoD,
            spatial_reference: None,
            layer_count: 0,
            table_count: 0,
        })
    }

    pub fn with_map_info(mut self, info: HostMap) -> Self {
        self.maps.push(MemoryMap {
            info,
            layers: Vec::new(),
            tables: Vec::new(),
        });
        self
    }

    /// Add a layer to `map`; counts on the map are kept in sync
    pub fn with_layer(mut self, map: &str, layer: HostLayer, data: SourceData) -> Self {
        let source = SourceRef::new(map, layer.key.clone());
        if let Some(m) = self.maps.iter_mut().find(|m| m.info.name == map) {
            if layer.parent_key.is_none() {
                m.info.layer_count += 1;
            }
            m.layers.push(layer);
        }
        self.sources.insert(source, data);
        self
    }

    pub fn with_table(mut self, map: &str, table: HostTable, data: SourceData) -> Self {
        let source = SourceRef::new(map, table.key.clone());
        if let Some(m) = self.maps.iter_mut().find(|m| m.info.name == map) {
            m.info.table_count += 1;
            m.tables.push(table);
        }
        self.sources.insert(source, data);
        self
    }

    pub fn with_layout(mut self, layout: HostLayout) -> Self {
        self.layouts.push(layout);
        self
    }

    pub fn with_active_view(mut self, map: &str, extent: Option<ExtentInfo>, scale: Option<f64>) -> Self {
        self.active = Some(ActiveView {
            map_name: map.to_string(),
            extent,
            scale,
        });
        self
    }

    pub fn with_item(mut self, name: &str, type_id: &str, path: Option<&str>) -> Self {
        self.items.push(ProjectItem {
            name: name.to_string(),
            type_id: type_id.to_string(),
            path: path.map(str::to_string),
        });
        self
    }

    /// Make one query against one source fail
    pub fn with_fault(mut self, map: &str, key: &str, probe: Probe) -> Self {
        self.faults.insert((SourceRef::new(map, key), probe));
        self
    }

    /// Make the map item impossible to open
    pub fn with_broken_map(mut self, map: &str) -> Self {
        self.broken_maps.insert(map.to_string());
        self
    }

    /// Make rendering of a layout (or `"<active map>"`) fail
    pub fn with_render_fault(mut self, name: &str) -> Self {
        self.render_faults.insert(name.to_string());
        self
    }

    /// Sleep on every map lookup, to stretch a collection out
    pub fn with_map_delay(mut self, delay: Duration) -> Self {
        self.map_delay = Some(delay);
        self
    }

    fn data(&self, source: &SourceRef, probe: Probe) -> HostResult<&SourceData> {
        if self.faults.contains(&(source.clone(), probe)) {
            return Err(HostError::Failed(format!("{probe:?} failed for {source}")));
        }
        self.sources
            .get(source)
            .ok_or_else(|| HostError::NotFound(source.to_string()))
    }

    fn find_map(&self, name: &str) -> HostResult<&MemoryMap> {
        self.maps
            .iter()
            .find(|m| m.info.name == name)
            .ok_or_else(|| HostError::NotFound(name.to_string()))
    }

    fn write_placeholder(&self, label: &str, output: &Path) -> HostResult<()> {
        if self.render_faults.contains(label) {
            return Err(HostError::Failed(format!("cannot render {label}")));
        }
        std::fs::write(output, b"\x89PNG\r\n\x1a\n").map_err(|e| HostError::Failed(e.to_string()))
    }
}

/// Render-fault label for the active map view
pub const ACTIVE_MAP: &str = "<active map>";

impl SourceAdapter for MemorySource {
    fn project(&self) -> HostResult<Option<HostProject>> {
        Ok(self.project.clone())
    }

    fn map_names(&self) -> HostResult<Vec<String>> {
        Ok(self.maps.iter().map(|m| m.info.name.clone()).collect())
    }

    fn map(&self, name: &str) -> HostResult<Option<HostMap>> {
        if let Some(delay) = self.map_delay {
            thread::sleep(delay);
        }
        if self.broken_maps.contains(name) {
            return Ok(None);
        }
        Ok(self.find_map(name).ok().map(|m| m.info.clone()))
    }

    fn layout_names(&self) -> HostResult<Vec<String>> {
        Ok(self.layouts.iter().map(|l| l.name.clone()).collect())
    }

    fn layout(&self, name: &str) -> HostResult<Option<HostLayout>> {
        Ok(self.layouts.iter().find(|l| l.name == name).cloned())
    }

    fn active_view(&self) -> HostResult<Option<ActiveView>> {
        Ok(self.active.clone())
    }

    fn layers(&self, map: &str) -> HostResult<Vec<HostLayer>> {
        Ok(self.find_map(map)?.layers.clone())
    }

    fn standalone_tables(&self, map: &str) -> HostResult<Vec<HostTable>> {
        Ok(self.find_map(map)?.tables.clone())
    }

    fn data_source(&self, source: &SourceRef) -> HostResult<Option<DataSource>> {
        Ok(self.data(source, Probe::DataSource)?.data_source.clone())
    }

    fn fields(&self, source: &SourceRef) -> HostResult<Vec<HostField>> {
        Ok(self.data(source, Probe::Fields)?.fields.clone())
    }

    fn field_domain(&self, source: &SourceRef, field: &str) -> HostResult<Option<String>> {
        Ok(self.data(source, Probe::Domain)?.domains.get(field).cloned())
    }

    fn row_count(&self, source: &SourceRef) -> HostResult<u64> {
        Ok(self.data(source, Probe::RowCount)?.row_count)
    }

    fn selection_count(&self, source: &SourceRef) -> HostResult<u64> {
        Ok(self.data(source, Probe::Selection)?.selection_count)
    }

    fn renderer(&self, source: &SourceRef) -> HostResult<Option<Renderer>> {
        Ok(self.data(source, Probe::Renderer)?.renderer.clone())
    }

    fn rows(&self, source: &SourceRef, limit: usize) -> HostResult<Vec<HostRow>> {
        Ok(self
            .data(source, Probe::Rows)?
            .rows
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    fn project_items(&self) -> HostResult<Vec<ProjectItem>> {
        Ok(self.items.clone())
    }

    fn render_active_map(&self, output: &Path) -> HostResult<()> {
        if self.active.is_none() {
            return Err(HostError::NotFound("active map view".to_string()));
        }
        self.write_placeholder(ACTIVE_MAP, output)
    }

    fn render_layout(&self, name: &str, output: &Path) -> HostResult<()> {
        if !self.layouts.iter().any(|l| l.name == name) {
            return Err(HostError::NotFound(name.to_string()));
        }
        self.write_placeholder(name, output)
    }
}

/// Shorthand for a top-level layer
pub fn layer(key: &str, name: &str, kind: LayerKind) -> HostLayer {
    HostLayer {
        key: key.to_string(),
        name: name.to_string(),
        kind,
        parent_key: None,
        visible: true,
        editable: true,
        connected: true,
        definition_query: None,
        geometry_type: None,
    }
}

/// Shorthand for a standalone table
pub fn table(key: &str, name: &str) -> HostTable {
    HostTable {
        key: key.to_string(),
        name: name.to_string(),
        connected: true,
        definition_query: None,
    }
}

/// Shorthand for a nullable, editable field
pub fn field(name: &str, field_type: &str) -> HostField {
    HostField {
        name: name.to_string(),
        alias: None,
        field_type: field_type.to_string(),
        length: None,
        nullable: true,
        editable: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        MemorySource::new()
            .with_map("Main")
            .with_layer(
                "Main",
                layer("L1", "Roads", LayerKind::Feature),
                SourceData::at("C:/data/city.gdb/roads", "FileGDB").with_counts(120, 3),
            )
            .with_table("Main", table("T1", "Owners"), SourceData::default())
    }

    #[test]
    fn test_counts_follow_builder() {
        let s = source();
        let map = s.map("Main").unwrap().unwrap();
        assert_eq!(map.layer_count, 1);
        assert_eq!(map.table_count, 1);
    }

    #[test]
    fn test_per_source_queries() {
        let s = source();
        let r = SourceRef::new("Main", "L1");
        assert_eq!(s.row_count(&r).unwrap(), 120);
        assert_eq!(s.selection_count(&r).unwrap(), 3);
        assert_eq!(
            s.data_source(&r).unwrap().unwrap().path.as_deref(),
            Some("C:/data/city.gdb/roads")
        );
    }

    #[test]
    fn test_fault_injection() {
        let s = source().with_fault("Main", "L1", Probe::RowCount);
        let r = SourceRef::new("Main", "L1");
        assert!(matches!(s.row_count(&r), Err(HostError::Failed(_))));
        assert!(s.selection_count(&r).is_ok());
    }

    #[test]
    fn test_unknown_source() {
        let s = source();
        let r = SourceRef::new("Main", "missing");
        assert!(matches!(s.fields(&r), Err(HostError::NotFound(_))));
    }

    #[test]
    fn test_broken_map_yields_none() {
        let s = source().with_broken_map("Main");
        assert_eq!(s.map("Main").unwrap(), None);
        assert_eq!(s.map_names().unwrap(), vec!["Main".to_string()]);
    }

    #[test]
    fn test_render_requires_active_view() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("map.png");
        assert!(source().render_active_map(&out).is_err());

        let s = source().with_active_view("Main", None, None);
        s.render_active_map(&out).unwrap();
        assert!(out.exists());
    }
}
