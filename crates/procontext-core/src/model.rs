//! Normalized data model of an exported project context
//!
//! Every record here is produced once per export run and never mutated
//! afterwards. Collections always serialize as arrays (possibly empty);
//! scalars that can legitimately be unknown are `Option` and are omitted
//! from JSON when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Bundle schema version written to `meta.json`
pub const SCHEMA_VERSION: &str = "1.0";

/// Version of this tool, recorded in every bundle
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Root document of an export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportContext {
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectInfo>,
    #[serde(default)]
    pub maps: Vec<MapInfo>,
    #[serde(default)]
    pub layers: Vec<LayerInfo>,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub connections: Vec<ConnectionInfo>,
    #[serde(default)]
    pub layouts: Vec<LayoutInfo>,
    #[serde(default)]
    pub notebooks: Vec<NotebookInfo>,
}

impl ExportContext {
    /// A context with only metadata, used when no project is open
    pub fn empty(meta: Meta) -> Self {
        Self {
            meta,
            ..Default::default()
        }
    }

    /// The map currently shown in the active view, if any
    pub fn active_map(&self) -> Option<&MapInfo> {
        self.maps.iter().find(|m| m.is_active_map)
    }

    /// Layers owned by the named map, in collection order
    pub fn layers_in_map<'a>(&'a self, map_name: &'a str) -> impl Iterator<Item = &'a LayerInfo> {
        self.layers.iter().filter(move |l| l.map_name == map_name)
    }
}

/// Metadata about the export itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Bundle schema version
    pub version: String,
    /// Version of the exporting tool
    #[serde(default)]
    pub tool_version: String,
    /// Export timestamp
    pub exported_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl Meta {
    /// Metadata stamped with the given time and the local machine/user
    pub fn new(exported_at: DateTime<Utc>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            tool_version: TOOL_VERSION.to_string(),
            exported_at,
            machine_name: whoami::fallible::hostname().ok(),
            user_name: Some(whoami::username()),
        }
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Project-level information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_geodatabase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_toolbox: Option<String>,
    #[serde(default)]
    pub map_names: Vec<String>,
    #[serde(default)]
    pub layout_names: Vec<String>,
}

/// Kind of map view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapKind {
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
}

impl MapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapKind::TwoD => "2D",
            MapKind::ThreeD => "3D",
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map-level information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    /// Stable id derived from project path, name and kind
    pub id: String,
    pub name: String,
    pub map_type: MapKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_reference_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_reference_wkid: Option<i32>,
    pub layer_count: usize,
    pub standalone_table_count: usize,
    /// Only present for the active map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<ExtentInfo>,
    /// Only present for the active map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    pub is_active_map: bool,
}

/// Spatial extent of a view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtentInfo {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_reference_wkid: Option<i32>,
}

/// Layer information (feature, raster, group, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub id: String,
    pub name: String,
    pub map_name: String,
    /// Layer kind tag, e.g. `FeatureLayer`
    pub layer_type: String,
    /// Absent for non-vector layers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_type: Option<String>,
    pub is_visible: bool,
    pub is_editable: bool,
    pub is_broken: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_count: Option<u64>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub joined_tables: Vec<String>,
    #[serde(default)]
    pub related_tables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_group_layer: Option<String>,
    #[serde(default)]
    pub sample_data: Vec<SampleRow>,
}

/// Field/attribute schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    pub is_nullable: bool,
    pub is_editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

/// Standalone table information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub id: String,
    pub name: String,
    pub map_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_type: Option<String>,
    pub is_broken: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub sample_data: Vec<SampleRow>,
}

/// One sampled row: attributes in field order plus optional GeoJSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRow {
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
}

/// Database or folder connection. Credentials are never captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub name: String,
    pub connection_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Layout information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_units: Option<String>,
    #[serde(default)]
    pub map_frame_names: Vec<String>,
    #[serde(default)]
    pub map_frames: Vec<MapFrameInfo>,
}

/// Map frame placed on a layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFrameInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
}

/// Notebook artifact summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookInfo {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cell_count: usize,
    #[serde(default)]
    pub cell_breakdown: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Outcome of one orchestrator call
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub files_created: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl ExportResult {
    /// A failed result carrying a single error
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_collections_serialize_as_arrays() {
        let ctx = ExportContext::empty(Meta::new(Utc::now()));
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["layers"], serde_json::json!([]));
        assert_eq!(json["notebooks"], serde_json::json!([]));
        assert!(json.get("project").is_none());
    }

    #[test]
    fn test_camel_case_and_null_omission() {
        let layer = LayerInfo {
            id: "x".to_string(),
            name: "Roads".to_string(),
            map_name: "Main".to_string(),
            layer_type: "FeatureLayer".to_string(),
            is_visible: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(json["mapName"], "Main");
        assert_eq!(json["isVisible"], true);
        assert!(json.get("featureCount").is_none());
        assert!(json.get("geometryType").is_none());
        assert_eq!(json["sampleData"], serde_json::json!([]));
    }

    #[test]
    fn test_map_kind_tags() {
        assert_eq!(serde_json::to_string(&MapKind::TwoD).unwrap(), "\"2D\"");
        assert_eq!(serde_json::to_string(&MapKind::ThreeD).unwrap(), "\"3D\"");
        assert_eq!(MapKind::ThreeD.to_string(), "3D");
    }

    #[test]
    fn test_meta_defaults() {
        let meta = Meta::new(Utc::now());
        assert_eq!(meta.version, SCHEMA_VERSION);
        assert_eq!(meta.tool_version, TOOL_VERSION);
    }

    #[test]
    fn test_failed_result() {
        let result = ExportResult::failed("No project is currently open");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["No project is currently open".to_string()]);
        assert!(result.files_created.is_empty());
    }
}
