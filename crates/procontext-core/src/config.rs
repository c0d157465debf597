//! Configuration management for procontext

use crate::error::{ProContextError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Export settings
    pub export: ExportConfig,
    /// Auto-export on project open
    pub auto_export: AutoExportConfig,
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ProContextError::Toml(e.to_string()).with_context(format!("Failed to parse {}", path.display()))
        })
    }

    /// Write as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ProContextError::Toml(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Export-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Render map and layout images in snapshot mode
    pub export_images: bool,
    /// Summarize notebooks found in the project
    pub export_notebooks: bool,
    /// Include field schemas for layers and tables
    pub export_fields: bool,
    /// Sample rows per layer/table (0 disables sampling)
    pub sample_row_count: usize,
    /// Which maps to collect
    pub map_filter: MapFilter,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_images: true,
            export_notebooks: true,
            export_fields: true,
            sample_row_count: 10,
            map_filter: MapFilter::All,
        }
    }
}

/// Auto-export policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoExportConfig {
    pub enabled: bool,
    /// Skip projects stored on network shares
    pub local_only: bool,
    /// Skip projects with more layers than this (0 = unlimited)
    pub max_layers: usize,
}

impl Default for AutoExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            local_only: true,
            max_layers: 50,
        }
    }
}

impl AutoExportConfig {
    /// Whether a project at `project_path` with `total_layers` may be auto-exported
    pub fn permits(&self, project_path: Option<&str>, total_layers: usize) -> bool {
        if !self.enabled {
            return false;
        }
        if self.local_only {
            if let Some(path) = project_path {
                if path.starts_with("\\\\") || path.starts_with("//") {
                    debug!("Auto-export skipped for network path {}", path);
                    return false;
                }
            }
        }
        if self.max_layers > 0 && total_layers > self.max_layers {
            debug!(
                "Auto-export skipped: {} layers exceeds limit of {}",
                total_layers, self.max_layers
            );
            return false;
        }
        true
    }
}

/// Which maps the collector visits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "names", rename_all = "kebab-case")]
pub enum MapFilter {
    #[default]
    All,
    /// Only the map shown in the active view
    ActiveOnly,
    /// Only the named maps
    IncludeNamed(Vec<String>),
    /// Every map except the named ones
    ExcludeNamed(Vec<String>),
}

impl MapFilter {
    /// Whether `map_name` passes. `active_map` is the active view's map.
    pub fn accepts(&self, map_name: &str, active_map: Option<&str>) -> bool {
        let matches = |names: &[String]| names.iter().any(|n| names_equal(n, map_name));
        match self {
            MapFilter::All => true,
            MapFilter::ActiveOnly => active_map.is_some_and(|a| names_equal(a, map_name)),
            MapFilter::IncludeNamed(names) => matches(names),
            MapFilter::ExcludeNamed(names) => !matches(names),
        }
    }
}

fn names_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Options passed explicitly into every export entry point
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub export_images: bool,
    pub export_notebooks: bool,
    pub export_fields: bool,
    pub sample_row_count: usize,
    pub map_filter: MapFilter,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ExportOptions {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            export_images: config.export_images,
            export_notebooks: config.export_notebooks,
            export_fields: config.export_fields,
            sample_row_count: config.sample_row_count,
            map_filter: config.map_filter.clone(),
        }
    }

    /// Same options restricted to the active map
    pub fn active_map_only(mut self) -> Self {
        self.map_filter = MapFilter::ActiveOnly;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.export.export_images);
        assert_eq!(config.export.sample_row_count, 10);
        assert!(!config.auto_export.enabled);
        assert!(config.auto_export.local_only);
        assert_eq!(config.auto_export.max_layers, 50);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.export.map_filter = MapFilter::ExcludeNamed(vec!["Scratch".to_string()]);
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[export]"));
        assert!(toml.contains("[auto_export]"));

        let config2: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[export]\nsample_row_count = 0\n").unwrap();
        assert_eq!(config.export.sample_row_count, 0);
        assert!(config.export.export_fields);
        assert_eq!(config.export.map_filter, MapFilter::All);
    }

    #[test]
    fn test_load_missing_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".arcgispro").join("config.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.auto_export.enabled = true;
        config.save(&path).unwrap();
        assert!(Config::load(&path).unwrap().auto_export.enabled);
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "export = [").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_map_filter() {
        assert!(MapFilter::All.accepts("Main", None));
        assert!(MapFilter::ActiveOnly.accepts("main", Some("Main")));
        assert!(!MapFilter::ActiveOnly.accepts("Main", None));

        let include = MapFilter::IncludeNamed(vec![" Main ".to_string()]);
        assert!(include.accepts("MAIN", None));
        assert!(!include.accepts("Other", None));

        let exclude = MapFilter::ExcludeNamed(vec!["scratch".to_string()]);
        assert!(!exclude.accepts("Scratch", None));
        assert!(exclude.accepts("Main", None));
    }

    #[test]
    fn test_auto_export_policy() {
        let mut policy = AutoExportConfig::default();
        assert!(!policy.permits(Some("C:/p/p.aprx"), 1));

        policy.enabled = true;
        assert!(policy.permits(Some("C:/p/p.aprx"), 50));
        assert!(!policy.permits(Some("C:/p/p.aprx"), 51));
        assert!(!policy.permits(Some("\\\\server\\share\\p.aprx"), 1));
        assert!(!policy.permits(Some("//server/share/p.aprx"), 1));

        policy.local_only = false;
        policy.max_layers = 0;
        assert!(policy.permits(Some("//server/share/p.aprx"), 10_000));
    }

    #[test]
    fn test_options_from_config() {
        let config = ExportConfig {
            export_images: false,
            sample_row_count: 3,
            ..Default::default()
        };
        let options = ExportOptions::from_config(&config);
        assert!(!options.export_images);
        assert_eq!(options.sample_row_count, 3);
        assert_eq!(options.active_map_only().map_filter, MapFilter::ActiveOnly);
    }
}
