//! JSON documents of the bundle: `meta.json` and `context/*.json`

use super::exporter::{Location, Renderer};
use crate::error::Result;
use crate::model::ExportContext;
use serde::Serialize;

/// One JSON document per top-level collection, plus the root metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonSection {
    Meta,
    Project,
    Maps,
    Layers,
    Tables,
    Connections,
    Layouts,
    Notebooks,
}

impl JsonSection {
    /// Every section in write order
    pub const ALL: [JsonSection; 8] = [
        JsonSection::Meta,
        JsonSection::Project,
        JsonSection::Maps,
        JsonSection::Layers,
        JsonSection::Tables,
        JsonSection::Connections,
        JsonSection::Layouts,
        JsonSection::Notebooks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JsonSection::Meta => "meta",
            JsonSection::Project => "project",
            JsonSection::Maps => "maps",
            JsonSection::Layers => "layers",
            JsonSection::Tables => "tables",
            JsonSection::Connections => "connections",
            JsonSection::Layouts => "layouts",
            JsonSection::Notebooks => "notebooks",
        }
    }

    /// Path relative to the output root
    pub fn relative_path(&self) -> &'static str {
        match self {
            JsonSection::Meta => "meta.json",
            JsonSection::Project => "context/project.json",
            JsonSection::Maps => "context/maps.json",
            JsonSection::Layers => "context/layers.json",
            JsonSection::Tables => "context/tables.json",
            JsonSection::Connections => "context/connections.json",
            JsonSection::Layouts => "context/layouts.json",
            JsonSection::Notebooks => "context/notebooks.json",
        }
    }

    /// Serialize this section of the context
    pub fn to_json(&self, context: &ExportContext) -> Result<String> {
        match self {
            JsonSection::Meta => pretty(&context.meta),
            JsonSection::Project => pretty(&context.project),
            JsonSection::Maps => pretty(&context.maps),
            JsonSection::Layers => pretty(&context.layers),
            JsonSection::Tables => pretty(&context.tables),
            JsonSection::Connections => pretty(&context.connections),
            JsonSection::Layouts => pretty(&context.layouts),
            JsonSection::Notebooks => pretty(&context.notebooks),
        }
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

impl Renderer for JsonSection {
    fn render(&self, context: &ExportContext) -> Result<Option<String>> {
        self.to_json(context).map(Some)
    }

    fn format_name(&self) -> &str {
        self.name()
    }

    fn location(&self) -> Location {
        Location::Bundle(self.relative_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerInfo, Meta, ProjectInfo};
    use serde_json::Value;

    fn parse(section: JsonSection, ctx: &ExportContext) -> Value {
        serde_json::from_str(&section.to_json(ctx).unwrap()).unwrap()
    }

    #[test]
    fn test_project_null_when_absent() {
        let ctx = ExportContext::empty(Meta::default());
        assert_eq!(parse(JsonSection::Project, &ctx), Value::Null);
        assert_eq!(parse(JsonSection::Layers, &ctx), serde_json::json!([]));
    }

    #[test]
    fn test_meta_keys() {
        let ctx = ExportContext::empty(Meta::default());
        let meta = parse(JsonSection::Meta, &ctx);
        assert_eq!(meta["version"], "1.0");
        assert!(meta["exportedAt"].is_string());
        assert!(meta.get("toolVersion").is_some());
    }

    #[test]
    fn test_sections_use_camel_case_and_omit_nulls() {
        let mut ctx = ExportContext::empty(Meta::default());
        ctx.project = Some(ProjectInfo {
            name: "parcels".to_string(),
            ..Default::default()
        });
        ctx.layers.push(LayerInfo {
            name: "Roads".to_string(),
            map_name: "Main".to_string(),
            layer_type: "FeatureLayer".to_string(),
            ..Default::default()
        });

        let project = parse(JsonSection::Project, &ctx);
        assert_eq!(project["mapNames"], serde_json::json!([]));
        assert!(project.get("path").is_none());

        let layers = parse(JsonSection::Layers, &ctx);
        assert_eq!(layers[0]["layerType"], "FeatureLayer");
        assert!(layers[0].get("dataSourcePath").is_none());
    }

    #[test]
    fn test_paths() {
        assert_eq!(JsonSection::Meta.location(), Location::Bundle("meta.json"));
        assert_eq!(JsonSection::Notebooks.relative_path(), "context/notebooks.json");
    }
}
