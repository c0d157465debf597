//! File system access to an exported bundle

use chrono::{DateTime, Utc};
use procontext_core::error::{ProContextError, Result};
use procontext_core::model::{ExportContext, Meta, ProjectInfo, SCHEMA_VERSION};
use procontext_core::OUTPUT_DIR;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JSON documents of a bundle, relative to its root
pub const CONTEXT_FILES: [&str; 8] = [
    "meta.json",
    "context/project.json",
    "context/maps.json",
    "context/layers.json",
    "context/tables.json",
    "context/connections.json",
    "context/layouts.json",
    "context/notebooks.json",
];

/// Read-only view of a `.arcgispro` bundle directory
#[derive(Debug, Clone)]
pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    /// Find the bundle in `start` or the nearest ancestor that has one
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        for dir in start.ancestors() {
            let candidate = dir.join(OUTPUT_DIR);
            if is_bundle(&candidate) {
                debug!("Found bundle at {:?}", candidate);
                return Ok(Self { root: candidate });
            }
        }
        Err(ProContextError::BundleNotFound(start.to_path_buf()))
    }

    /// Open a bundle root directly
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProContextError::BundleNotFound(root));
        }
        Ok(Self { root })
    }

    /// Bundle root (the `.arcgispro` directory)
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn context_dir(&self) -> PathBuf {
        self.root.join("context")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.root.join("snapshot")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Read every JSON document. Missing files give empty collections.
    pub fn load(&self) -> Result<ExportContext> {
        let meta = match self.read_json::<Meta>("meta.json")? {
            Some(meta) => meta,
            None => {
                warn!("meta.json missing in {:?}", self.root);
                Meta {
                    version: SCHEMA_VERSION.to_string(),
                    tool_version: String::new(),
                    exported_at: DateTime::<Utc>::default(),
                    machine_name: None,
                    user_name: None,
                }
            }
        };

        Ok(ExportContext {
            meta,
            project: self.read_json::<Option<ProjectInfo>>("context/project.json")?.flatten(),
            maps: self.read_json("context/maps.json")?.unwrap_or_default(),
            layers: self.read_json("context/layers.json")?.unwrap_or_default(),
            tables: self.read_json("context/tables.json")?.unwrap_or_default(),
            connections: self.read_json("context/connections.json")?.unwrap_or_default(),
            layouts: self.read_json("context/layouts.json")?.unwrap_or_default(),
            notebooks: self.read_json("context/notebooks.json")?.unwrap_or_default(),
        })
    }

    /// `snapshot/context.md`
    pub fn read_markdown(&self) -> Result<String> {
        self.read_text(&self.snapshot_dir().join("context.md"))
    }

    /// `snapshot/project-structure.mmd`
    pub fn read_diagram(&self) -> Result<String> {
        self.read_text(&self.snapshot_dir().join("project-structure.mmd"))
    }

    /// PNG files under `images/`, sorted by name
    pub fn images(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.images_dir()) else {
            return Vec::new();
        };

        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(e) => Some(e.path()),
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .filter(|path| {
                path.extension()
                    .map(|e| e.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
            })
            .collect();
        images.sort();
        images
    }

    /// Health of every expected file plus the images
    pub fn status(&self) -> BundleStatus {
        let mut problems = Vec::new();
        let mut exported_at = None;

        let files: Vec<FileStatus> = CONTEXT_FILES
            .iter()
            .map(|rel| {
                let path = self.root.join(rel);
                let state = file_state(&path);
                if rel == &"meta.json" {
                    exported_at = read_exported_at(&path);
                }
                if let FileState::Missing | FileState::Invalid = state {
                    problems.push(format!("{} is {}", rel, state.label()));
                }
                FileStatus {
                    name: rel.to_string(),
                    path: path.clone(),
                    state,
                }
            })
            .collect();

        let markdown = self.snapshot_dir().join("context.md").is_file();
        if !markdown {
            problems.push("snapshot/context.md is missing".to_string());
        }

        let images: Vec<String> = self
            .images()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        if self.images_dir().is_dir() && images.is_empty() {
            problems.push("no images exported".to_string());
        }

        BundleStatus {
            location: self.root.clone(),
            exported_at,
            files,
            markdown,
            images,
            problems,
        }
    }

    /// `Ok(None)` when the file does not exist
    fn read_json<T: DeserializeOwned>(&self, rel: &str) -> Result<Option<T>> {
        let path = self.root.join(rel);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not present", rel);
                return Ok(None);
            }
            Err(e) => return Err(ProContextError::Io(e)),
        };

        let value = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ProContextError::from(e).with_context(format!("Failed to parse {}", rel)))?;
        Ok(Some(value))
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        let content = fs::read_to_string(path).map_err(|e| {
            ProContextError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;
        Ok(content.trim_start_matches('\u{feff}').to_string())
    }
}

fn is_bundle(dir: &Path) -> bool {
    dir.join("meta.json").is_file() || dir.join("context").is_dir()
}

fn file_state(path: &Path) -> FileState {
    let Ok(content) = fs::read_to_string(path) else {
        return FileState::Missing;
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => FileState::Ok {
            items: Some(items.len()),
        },
        Ok(_) => FileState::Ok { items: None },
        Err(_) => FileState::Invalid,
    }
}

fn read_exported_at(path: &Path) -> Option<DateTime<Utc>> {
    let content = fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&content).ok()?;
    value.get("exportedAt")?.as_str()?.parse().ok()
}

/// State of one expected JSON document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FileState {
    /// Parsed; `items` is the length of a top-level array
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<usize>,
    },
    Missing,
    Invalid,
}

impl FileState {
    pub fn is_ok(&self) -> bool {
        matches!(self, FileState::Ok { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileState::Ok { .. } => "ok",
            FileState::Missing => "missing",
            FileState::Invalid => "invalid JSON",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub state: FileState,
}

/// Summary printed by `procontext status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleStatus {
    pub location: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    pub files: Vec<FileStatus>,
    /// Whether `snapshot/context.md` exists
    pub markdown: bool,
    /// Image file names
    pub images: Vec<String>,
    pub problems: Vec<String>,
}

impl BundleStatus {
    pub fn ok(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn ok_files(&self) -> usize {
        self.files.iter().filter(|f| f.state.is_ok()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_bundle() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join(OUTPUT_DIR);
        fs::create_dir_all(root.join("context")).unwrap();
        fs::create_dir_all(root.join("snapshot")).unwrap();
        fs::create_dir_all(root.join("images")).unwrap();
        fs::write(
            root.join("meta.json"),
            r#"{"version": "1.0", "toolVersion": "0.1.0", "exportedAt": "2026-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        fs::write(
            root.join("context/project.json"),
            r#"{"name": "parcels", "path": "C:/gis/parcels.aprx", "mapNames": ["Main"], "layoutNames": []}"#,
        )
        .unwrap();
        fs::write(
            root.join("context/layers.json"),
            r#"[{"id": "a", "name": "Roads", "mapName": "Main", "layerType": "FeatureLayer",
                 "isVisible": true, "isEditable": true, "isBroken": false, "featureCount": 1200}]"#,
        )
        .unwrap();
        fs::write(root.join("snapshot/context.md"), "\u{feff}# ArcGIS Pro Session Context\n").unwrap();
        fs::write(root.join("snapshot/project-structure.mmd"), "flowchart LR\n").unwrap();
        fs::write(root.join("images/map_Main.png"), b"\x89PNG").unwrap();
        fs::write(root.join("images/notes.txt"), "skip").unwrap();
        (temp, root)
    }

    #[test]
    fn test_discover_from_nested_dir() {
        let (temp, root) = create_bundle();
        let nested = temp.path().join("scripts/analysis");
        fs::create_dir_all(&nested).unwrap();

        let store = BundleStore::discover(&nested).unwrap();
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_discover_not_found() {
        let temp = TempDir::new().unwrap();
        // An empty .arcgispro directory is not a bundle
        fs::create_dir_all(temp.path().join(OUTPUT_DIR)).unwrap();

        let err = BundleStore::discover(temp.path()).unwrap_err();
        assert!(matches!(err, ProContextError::BundleNotFound(_)));
    }

    #[test]
    fn test_open_missing() {
        let temp = TempDir::new().unwrap();
        assert!(BundleStore::open(temp.path().join("nope")).is_err());
    }

    #[test]
    fn test_load() {
        let (_temp, root) = create_bundle();
        let context = BundleStore::open(&root).unwrap().load().unwrap();

        assert_eq!(context.project.as_ref().unwrap().name, "parcels");
        assert_eq!(context.layers.len(), 1);
        assert_eq!(context.layers[0].feature_count, Some(1200));
        assert!(context.maps.is_empty());
        assert!(context.notebooks.is_empty());
        assert_eq!(context.meta.exported_at.to_rfc3339(), "2026-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_load_without_meta() {
        let (_temp, root) = create_bundle();
        fs::remove_file(root.join("meta.json")).unwrap();

        let context = BundleStore::open(&root).unwrap().load().unwrap();
        assert_eq!(context.meta.version, SCHEMA_VERSION);
        assert_eq!(context.layers.len(), 1);
    }

    #[test]
    fn test_load_invalid_json() {
        let (_temp, root) = create_bundle();
        fs::write(root.join("context/maps.json"), "[{").unwrap();

        let err = BundleStore::open(&root).unwrap().load().unwrap_err();
        assert!(err.to_string().contains("context/maps.json"));
    }

    #[test]
    fn test_read_markdown_strips_bom() {
        let (_temp, root) = create_bundle();
        let store = BundleStore::open(&root).unwrap();
        assert!(store.read_markdown().unwrap().starts_with("# ArcGIS Pro"));
        assert_eq!(store.read_diagram().unwrap(), "flowchart LR\n");
    }

    #[test]
    fn test_images_only_png() {
        let (_temp, root) = create_bundle();
        let images = BundleStore::open(&root).unwrap().images();
        assert_eq!(images, vec![root.join("images/map_Main.png")]);
    }

    #[test]
    fn test_status() {
        let (_temp, root) = create_bundle();
        fs::write(root.join("context/tables.json"), "not json").unwrap();

        let status = BundleStore::open(&root).unwrap().status();
        assert_eq!(status.files.len(), CONTEXT_FILES.len());
        assert_eq!(status.images, vec!["map_Main.png".to_string()]);
        assert!(status.markdown);
        assert_eq!(
            status.exported_at.unwrap().to_rfc3339(),
            "2026-03-01T12:00:00+00:00"
        );

        let layers = status.files.iter().find(|f| f.name == "context/layers.json").unwrap();
        assert_eq!(layers.state, FileState::Ok { items: Some(1) });
        let tables = status.files.iter().find(|f| f.name == "context/tables.json").unwrap();
        assert_eq!(tables.state, FileState::Invalid);

        assert!(!status.ok());
        assert!(status.problems.contains(&"context/tables.json is invalid JSON".to_string()));
        assert!(status.problems.contains(&"context/maps.json is missing".to_string()));
        assert_eq!(status.ok_files(), 3);
    }

    #[test]
    fn test_status_json_shape() {
        let (_temp, root) = create_bundle();
        let status = BundleStore::open(&root).unwrap().status();
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["files"][0]["name"], "meta.json");
        assert_eq!(json["files"][0]["state"], "ok");
        assert_eq!(json["files"][3]["items"], 1);
        assert_eq!(json["files"][2]["state"], "missing");
    }
}
