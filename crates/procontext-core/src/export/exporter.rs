//! Renderer trait and the bundle writer that runs them

use crate::error::{ProContextError, Result};
use crate::model::ExportContext;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a rendered artifact lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Relative to the output root, e.g. `context/maps.json`
    Bundle(&'static str),
    /// Relative to the directory that contains the output root
    ProjectRoot(&'static str),
}

impl Location {
    /// Resolve against an output root. `None` if the root has no parent.
    pub fn resolve(&self, output_root: &Path) -> Option<PathBuf> {
        match self {
            Location::Bundle(rel) => Some(output_root.join(rel)),
            Location::ProjectRoot(rel) => output_root.parent().map(|p| p.join(rel)),
        }
    }
}

/// Trait for bundle artifact renderers
pub trait Renderer: Send + Sync {
    /// Render the artifact, or `None` when it does not apply to this context
    fn render(&self, context: &ExportContext) -> Result<Option<String>>;

    /// Get the format name
    fn format_name(&self) -> &str;

    /// Get the output location
    fn location(&self) -> Location;
}

/// Writes every registered artifact for a context, in registration order
pub struct BundleWriter {
    renderers: Vec<Box<dyn Renderer>>,
}

impl BundleWriter {
    /// Create a writer with the default bundle layout
    pub fn new() -> Self {
        let mut writer = Self::empty();

        for section in super::json::JsonSection::ALL {
            writer.register(Box::new(section));
        }
        writer.register(Box::new(super::markdown::ContextMarkdown::new()));
        writer.register(Box::new(super::diagram::DiagramSource));
        writer.register(Box::new(super::diagram::DiagramDocument));
        writer.register(Box::new(super::markdown::AgentsGuide));
        writer.register(Box::new(ActiveProjectMarker));

        writer
    }

    /// A writer with no renderers
    pub fn empty() -> Self {
        Self {
            renderers: Vec::new(),
        }
    }

    /// Register a new renderer
    pub fn register(&mut self, renderer: Box<dyn Renderer>) {
        self.renderers.push(renderer);
    }

    /// Format names in write order
    pub fn formats(&self) -> Vec<&str> {
        self.renderers.iter().map(|r| r.format_name()).collect()
    }

    /// Render and write everything, returning the paths written
    pub fn write(&self, context: &ExportContext, output_root: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.renderers.len());

        for renderer in &self.renderers {
            let Some(path) = renderer.location().resolve(output_root) else {
                debug!("Skipping {}: output root has no parent", renderer.format_name());
                continue;
            };
            let Some(content) = renderer.render(context)? else {
                debug!("Skipping {}: nothing to write", renderer.format_name());
                continue;
            };
            write_atomic(&path, &content)
                .map_err(|e| e.with_context(format!("Failed to write {}", path.display())))?;
            written.push(path);
        }

        debug!("Wrote {} files under {}", written.len(), output_root.display());
        Ok(written)
    }
}

impl Default for BundleWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write through a sibling temp file and rename into place
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| ProContextError::Config(format!("Not a file path: {}", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// `active_project.txt`: the project path, or its name when unsaved
pub struct ActiveProjectMarker;

impl Renderer for ActiveProjectMarker {
    fn render(&self, context: &ExportContext) -> Result<Option<String>> {
        Ok(context
            .project
            .as_ref()
            .map(|p| p.path.clone().unwrap_or_else(|| p.name.clone())))
    }

    fn format_name(&self) -> &str {
        "active-project"
    }

    fn location(&self) -> Location {
        Location::Bundle("active_project.txt")
    }
}
