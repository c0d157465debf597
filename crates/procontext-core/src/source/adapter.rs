//! Read-only query surface over the host object model

use crate::geometry::Geometry;
use crate::model::{ExtentInfo, MapKind};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Failure of a single host call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host reported an error
    #[error("host call failed: {0}")]
    Failed(String),

    /// The host does not offer this query
    #[error("not supported by this host: {0}")]
    Unsupported(String),

    /// The requested object does not exist
    #[error("object not found: {0}")]
    NotFound(String),

    /// The serialized call boundary is gone
    #[error("host call boundary is closed")]
    Disconnected,
}

/// Result of a host call
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Identity and default paths of the open project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostProject {
    pub name: String,
    /// Project file location, if the project has been saved
    pub path: Option<String>,
    pub default_geodatabase: Option<String>,
    pub default_toolbox: Option<String>,
}

/// Spatial reference of a map
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialReference {
    pub name: String,
    pub wkid: Option<i32>,
}

/// Map metadata
#[derive(Debug, Clone, PartialEq)]
pub struct HostMap {
    pub name: String,
    pub kind: MapKind,
    pub spatial_reference: Option<SpatialReference>,
    /// Top-level layer count
    pub layer_count: usize,
    pub table_count: usize,
}

/// The view the user is currently looking at
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveView {
    pub map_name: String,
    pub extent: Option<ExtentInfo>,
    pub scale: Option<f64>,
}

/// Layer kind as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Feature,
    Raster,
    Group,
    Other(String),
}

impl LayerKind {
    /// Tag written to `layerType`
    pub fn tag(&self) -> &str {
        match self {
            LayerKind::Feature => "FeatureLayer",
            LayerKind::Raster => "RasterLayer",
            LayerKind::Group => "GroupLayer",
            LayerKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One entry of a map's flattened layer tree
#[derive(Debug, Clone, PartialEq)]
pub struct HostLayer {
    /// Host-unique key, stable for the lifetime of the session
    pub key: String,
    pub name: String,
    pub kind: LayerKind,
    /// Key of the enclosing group layer
    pub parent_key: Option<String>,
    pub visible: bool,
    pub editable: bool,
    pub connected: bool,
    pub definition_query: Option<String>,
    /// Shape type for vector layers
    pub geometry_type: Option<String>,
}

/// A standalone table in a map
#[derive(Debug, Clone, PartialEq)]
pub struct HostTable {
    pub key: String,
    pub name: String,
    pub connected: bool,
    pub definition_query: Option<String>,
}

/// Addresses a layer or table for per-source queries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub map: String,
    pub key: String,
}

impl SourceRef {
    pub fn new(map: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            map: map.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.map, self.key)
    }
}

/// Backing store of a layer or table
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub path: Option<String>,
    /// e.g. `FileGDB`, `EnterpriseGDB`, `FileSystem`
    pub kind: String,
}

/// Field schema as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct HostField {
    pub name: String,
    pub alias: Option<String>,
    pub field_type: String,
    pub length: Option<i32>,
    pub nullable: bool,
    pub editable: bool,
}

/// Renderer metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Renderer {
    pub kind: String,
    /// Primary field driving the symbology
    pub field: Option<String>,
}

/// Attribute value read from a row cursor
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<FixedOffset>),
    Guid(Uuid),
    Blob(Vec<u8>),
}

/// A row yielded by a bounded cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostRow {
    /// Attribute values in field order
    pub values: Vec<(String, HostValue)>,
    pub shape: Option<Geometry>,
}

/// Page setup of a layout
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub width: f64,
    pub height: f64,
    pub units: String,
}

/// Map frame element of a layout
#[derive(Debug, Clone, PartialEq)]
pub struct HostMapFrame {
    pub name: String,
    pub map_name: Option<String>,
}

/// Layout metadata
#[derive(Debug, Clone, PartialEq)]
pub struct HostLayout {
    pub name: String,
    pub page: Option<Page>,
    pub frames: Vec<HostMapFrame>,
}

/// A catalog item of the project (connection, notebook, toolbox, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    pub name: String,
    pub type_id: String,
    pub path: Option<String>,
}

/// Read-only access to the host object model.
///
/// Implementations are owned by a [`super::HostQueue`] worker and are
/// only ever called from that one thread. Every call may fail.
pub trait SourceAdapter: Send {
    /// The open project, or `None` when nothing is open
    fn project(&self) -> HostResult<Option<HostProject>>;

    /// Names of every map in the project, in project order
    fn map_names(&self) -> HostResult<Vec<String>>;

    /// Map metadata; `None` when the map item cannot be opened
    fn map(&self, name: &str) -> HostResult<Option<HostMap>>;

    /// Names of every layout in the project
    fn layout_names(&self) -> HostResult<Vec<String>>;

    /// Layout metadata; `None` when the layout item cannot be opened
    fn layout(&self, name: &str) -> HostResult<Option<HostLayout>>;

    /// The active map view
    fn active_view(&self) -> HostResult<Option<ActiveView>>;

    /// The map's layer tree, flattened depth-first
    fn layers(&self, map: &str) -> HostResult<Vec<HostLayer>>;

    fn standalone_tables(&self, map: &str) -> HostResult<Vec<HostTable>>;

    fn data_source(&self, source: &SourceRef) -> HostResult<Option<DataSource>>;

    fn fields(&self, source: &SourceRef) -> HostResult<Vec<HostField>>;

    /// Domain attached to a field
    fn field_domain(&self, _source: &SourceRef, _field: &str) -> HostResult<Option<String>> {
        Ok(None)
    }

    /// Feature or row count
    fn row_count(&self, source: &SourceRef) -> HostResult<u64>;

    fn selection_count(&self, source: &SourceRef) -> HostResult<u64>;

    fn renderer(&self, source: &SourceRef) -> HostResult<Option<Renderer>>;

    /// At most `limit` rows from a fresh cursor
    fn rows(&self, source: &SourceRef, limit: usize) -> HostResult<Vec<HostRow>>;

    /// Catalog items of the project
    fn project_items(&self) -> HostResult<Vec<ProjectItem>>;

    /// Render the active map view to a PNG file
    fn render_active_map(&self, _output: &Path) -> HostResult<()> {
        Err(HostError::Unsupported("map view rendering".to_string()))
    }

    /// Render a layout to a PNG file
    fn render_layout(&self, _name: &str, _output: &Path) -> HostResult<()> {
        Err(HostError::Unsupported("layout rendering".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_kind_tags() {
        assert_eq!(LayerKind::Feature.tag(), "FeatureLayer");
        assert_eq!(LayerKind::Group.to_string(), "GroupLayer");
        assert_eq!(LayerKind::Other("TinLayer".to_string()).tag(), "TinLayer");
    }

    #[test]
    fn test_source_ref_display() {
        assert_eq!(SourceRef::new("Main", "L1").to_string(), "Main/L1");
    }
}
