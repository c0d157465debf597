//! Raster images of the active map view and of every layout

use crate::config::ExportOptions;
use crate::error::{ProContextError, Result};
use crate::source::{HostQueue, HostResult};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Longest sanitized file-name stem
pub const MAX_NAME_LEN: usize = 50;

/// Produces the `images/` directory of a bundle
pub trait ImageExporter: Send + Sync {
    /// Export every image, returning the files written. Per-item failures
    /// are logged and skipped; cancellation is returned as
    /// [`ProContextError::Cancelled`].
    fn export_all(
        &self,
        host: &HostQueue,
        output_root: &Path,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>>;
}

/// Renders through the host's view and layout rendering hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewImageExporter;

impl ViewImageExporter {
    fn export_active_map(&self, host: &HostQueue, dir: &Path, options: &ExportOptions) -> Result<Option<PathBuf>> {
        let dir = dir.to_path_buf();
        let filter = options.map_filter.clone();

        let outcome = host.run(move |source| -> HostResult<Option<PathBuf>> {
            let Some(view) = source.active_view()? else {
                return Ok(None);
            };
            if !filter.accepts(&view.map_name, Some(&view.map_name)) {
                return Ok(None);
            }
            let path = dir.join(format!("map_{}.png", sanitize_file_name(&view.map_name)));
            source.render_active_map(&path)?;
            Ok(Some(path))
        })?;

        match outcome {
            Ok(path) => {
                if path.is_none() {
                    debug!("No active map view to export");
                }
                Ok(path)
            }
            Err(e) => {
                warn!("Failed to export active map view: {}", e);
                Ok(None)
            }
        }
    }

    fn export_layout(&self, host: &HostQueue, dir: &Path, name: String) -> Result<Option<PathBuf>> {
        let path = dir.join(format!("layout_{}.png", sanitize_file_name(&name)));
        let target = path.clone();
        let label = name.clone();

        let outcome = host.run(move |source| source.render_layout(&name, &target))?;
        match outcome {
            Ok(()) => Ok(Some(path)),
            Err(e) => {
                warn!("Failed to export layout {}: {}", label, e);
                Ok(None)
            }
        }
    }
}

impl ImageExporter for ViewImageExporter {
    fn export_all(
        &self,
        host: &HostQueue,
        output_root: &Path,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let dir = output_root.join("images");
        fs::create_dir_all(&dir)?;

        let mut written = Vec::new();
        if cancel.is_cancelled() {
            return Err(ProContextError::Cancelled);
        }
        written.extend(self.export_active_map(host, &dir, options)?);

        let layouts = host.run(|source| source.layout_names())?.unwrap_or_else(|e| {
            warn!("Failed to list layouts: {}", e);
            Vec::new()
        });
        for name in layouts {
            if cancel.is_cancelled() {
                return Err(ProContextError::Cancelled);
            }
            written.extend(self.export_layout(host, &dir, name)?);
        }

        debug!("Exported {} images", written.len());
        Ok(written)
    }
}

/// Make a name safe as a file-name stem
///
/// Characters invalid in file names, ASCII control characters and spaces
/// become `_`; the result is cut to [`MAX_NAME_LEN`] characters.
pub fn sanitize_file_name(name: &str) -> String {
    if name.is_empty() {
        return "unnamed".to_string();
    }
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            c if c.is_ascii_control() => '_',
            c => c,
        })
        .take(MAX_NAME_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapFilter;
    use crate::source::memory::ACTIVE_MAP;
    use crate::source::{HostLayout, MemorySource};
    use pretty_assertions::assert_eq;

    fn layout(name: &str) -> HostLayout {
        HostLayout {
            name: name.to_string(),
            page: None,
            frames: Vec::new(),
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_map("Main Map")
            .with_active_view("Main Map", None, None)
            .with_layout(layout("Print A"))
            .with_layout(layout("Print/B"))
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(""), "unnamed");
        assert_eq!(sanitize_file_name("Main Map"), "Main_Map");
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
        assert_eq!(sanitize_file_name(&"x".repeat(80)).len(), MAX_NAME_LEN);
        assert_eq!(sanitize_file_name("Übersicht"), "Übersicht");
    }

    #[test]
    fn test_exports_map_and_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostQueue::spawn(source()).unwrap();
        let files = ViewImageExporter
            .export_all(&host, dir.path(), &ExportOptions::default(), &CancellationToken::new())
            .unwrap();

        let images = dir.path().join("images");
        assert_eq!(
            files,
            vec![
                images.join("map_Main_Map.png"),
                images.join("layout_Print_A.png"),
                images.join("layout_Print_B.png"),
            ]
        );
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_failures_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostQueue::spawn(source().with_render_fault(ACTIVE_MAP).with_render_fault("Print A")).unwrap();
        let files = ViewImageExporter
            .export_all(&host, dir.path(), &ExportOptions::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(files, vec![dir.path().join("images").join("layout_Print_B.png")]);
    }

    #[test]
    fn test_no_active_view() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostQueue::spawn(MemorySource::new()).unwrap();
        let files = ViewImageExporter
            .export_all(&host, dir.path(), &ExportOptions::default(), &CancellationToken::new())
            .unwrap();
        assert!(files.is_empty());
        assert!(dir.path().join("images").is_dir());
    }

    #[test]
    fn test_filtered_active_map_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostQueue::spawn(source()).unwrap();
        let options = ExportOptions {
            map_filter: MapFilter::ExcludeNamed(vec!["main map".to_string()]),
            ..Default::default()
        };
        let files = ViewImageExporter
            .export_all(&host, dir.path(), &options, &CancellationToken::new())
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostQueue::spawn(source()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ViewImageExporter
            .export_all(&host, dir.path(), &ExportOptions::default(), &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
