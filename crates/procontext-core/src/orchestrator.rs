//! Export orchestration
//!
//! [`ExportController`] runs at most one export at a time. A run waits up
//! to [`LOCK_TIMEOUT`] for the export lock, then moves through
//! `Locked -> Collecting -> ImageExporting -> Serializing` and back to
//! `Idle` (or `Failed`). Collection and image export are independent
//! phases: a failure in one is recorded and the other still runs.
//! Cancellation is reported as a warning, never as an error.

use crate::collector;
use crate::config::{Config, ExportOptions};
use crate::error::{ProContextError, Result};
use crate::export::BundleWriter;
use crate::images::{ImageExporter, ViewImageExporter};
use crate::model::{ExportResult, Meta};
use crate::source::{HostProject, HostQueue, HostResult};
use crate::OUTPUT_DIR;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a run waits for a previous run to finish
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Marker files from older exports, removed beside the output root
pub const LEGACY_MARKERS: [&str; 2] = ["AGENTS.md", "agents.md"];

const MSG_CONTEXT_CANCELLED: &str = "Context export was cancelled";
const MSG_IMAGES_CANCELLED: &str = "Image export was cancelled";
const MSG_NO_IMAGES: &str = "No images were exported (no active map view?)";

/// Observable phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Locked,
    Collecting,
    ImageExporting,
    Serializing,
    Failed,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Idle => "idle",
            ExportState::Locked => "locked",
            ExportState::Collecting => "collecting",
            ExportState::ImageExporting => "exporting images",
            ExportState::Serializing => "serializing",
            ExportState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which phases a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Context and images, replacing all prior output
    Snapshot,
    ContextOnly,
    ImagesOnly,
}

impl ExportMode {
    fn exports_context(&self) -> bool {
        !matches!(self, ExportMode::ImagesOnly)
    }

    fn exports_images(&self, options: &ExportOptions) -> bool {
        match self {
            ExportMode::Snapshot => options.export_images,
            ExportMode::ContextOnly => false,
            ExportMode::ImagesOnly => true,
        }
    }

    fn replaces_output(&self) -> bool {
        matches!(self, ExportMode::Snapshot)
    }
}

/// Holds the export lock for one run; publishes the final state on drop
struct Running<'a> {
    _lock: MutexGuard<'a, ()>,
    state: &'a Mutex<ExportState>,
    outcome: ExportState,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        *self.state.lock() = self.outcome;
    }
}

/// Serializes exports and composes collection, images and serialization
pub struct ExportController {
    host: HostQueue,
    images: Box<dyn ImageExporter>,
    writer: BundleWriter,
    lock: Mutex<()>,
    lock_timeout: Duration,
    current: Mutex<Option<CancellationToken>>,
    state: Mutex<ExportState>,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl ExportController {
    /// A controller with the default image exporter and bundle layout
    pub fn new(host: HostQueue) -> Self {
        Self {
            host,
            images: Box::new(ViewImageExporter),
            writer: BundleWriter::new(),
            lock: Mutex::new(()),
            lock_timeout: LOCK_TIMEOUT,
            current: Mutex::new(None),
            state: Mutex::new(ExportState::Idle),
            last_stamp: Mutex::new(None),
        }
    }

    /// Replace the image exporter
    pub fn with_image_exporter(mut self, images: Box<dyn ImageExporter>) -> Self {
        self.images = images;
        self
    }

    /// Replace the bundle writer
    pub fn with_writer(mut self, writer: BundleWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Override how long a run waits for the lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The host call boundary this controller drives
    pub fn host(&self) -> &HostQueue {
        &self.host
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock()
    }

    /// Context and images with full replacement of prior output
    pub fn run_snapshot(&self, options: &ExportOptions) -> ExportResult {
        self.run(ExportMode::Snapshot, options)
    }

    /// JSON, markdown and diagram only; prior output is kept
    pub fn run_context_only(&self, options: &ExportOptions) -> ExportResult {
        self.run(ExportMode::ContextOnly, options)
    }

    /// Images only; prior output is kept
    pub fn run_images_only(&self, options: &ExportOptions) -> ExportResult {
        self.run(ExportMode::ImagesOnly, options)
    }

    /// Cancel the export that is currently running, if any
    pub fn cancel_current(&self) {
        if let Some(token) = self.current.lock().as_ref() {
            debug!("Cancelling current export");
            token.cancel();
        }
    }

    /// Run a snapshot on project open when the auto-export policy allows.
    /// Returns `None` when no export was attempted.
    pub fn run_auto_export(&self, config: &Config) -> Option<ExportResult> {
        if !config.auto_export.enabled {
            return None;
        }

        let probe = self.host.run(|source| -> HostResult<Option<(Option<String>, usize)>> {
            let Some(project) = source.project()? else {
                return Ok(None);
            };
            let total = count_layers(source).unwrap_or_else(|e| {
                debug!("Layer count unavailable, allowing auto-export: {}", e);
                0
            });
            Ok(Some((project.path, total)))
        });

        let (path, total_layers) = match probe {
            Ok(Ok(Some(found))) => found,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) | Err(e) => {
                warn!("Auto-export skipped: {}", e);
                return None;
            }
        };
        if !config.auto_export.permits(path.as_deref(), total_layers) {
            return None;
        }

        info!("Auto-exporting snapshot");
        let result = self.run_snapshot(&ExportOptions::from_config(&config.export));
        if !result.success {
            warn!("Auto-export failed: {}", result.errors.join("; "));
        }
        Some(result)
    }

    fn run(&self, mode: ExportMode, options: &ExportOptions) -> ExportResult {
        let started = Instant::now();

        // The host queue is busy for a whole collection, so the lock comes first
        let Some(lock) = self.lock.try_lock_for(self.lock_timeout) else {
            debug!("Export lock not acquired within {:?}", self.lock_timeout);
            return finish(ExportResult::failed(ProContextError::ExportInProgress.to_string()), started);
        };
        let previous = self.state();
        *self.state.lock() = ExportState::Locked;
        let mut running = Running {
            _lock: lock,
            state: &self.state,
            outcome: ExportState::Failed,
        };

        let output_root = match self.output_root() {
            Ok(Some(root)) => root,
            Ok(None) => {
                running.outcome = previous;
                return finish(ExportResult::failed(ProContextError::NoProject.to_string()), started);
            }
            Err(e) => return finish(ExportResult::failed(e.to_string()), started),
        };

        info!("Starting {:?} export into {}", mode, output_root.display());
        let mut result = ExportResult {
            output_path: Some(output_root.clone()),
            ..Default::default()
        };
        self.run_locked(mode, options, &output_root, &mut result);

        result.success = result.errors.is_empty();
        running.outcome = if result.success {
            ExportState::Idle
        } else {
            ExportState::Failed
        };
        drop(running);

        let result = finish(result, started);
        info!(
            "Export finished in {:?}: {} files, {} errors, {} warnings",
            result.duration,
            result.files_created.len(),
            result.errors.len(),
            result.warnings.len()
        );
        result
    }

    fn run_locked(&self, mode: ExportMode, options: &ExportOptions, root: &Path, result: &mut ExportResult) {
        let cancel = {
            let mut current = self.current.lock();
            if let Some(previous) = current.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            *current = Some(token.clone());
            token
        };

        if mode.replaces_output() {
            if let Err(e) = clean_output(root) {
                result.errors.push(ProContextError::Cleanup(e.to_string()).to_string());
                return;
            }
        }
        if let Err(e) = fs::create_dir_all(root) {
            result
                .errors
                .push(format!("Failed to create output folder {}: {}", root.display(), e));
            return;
        }

        let context = if mode.exports_context() {
            self.set_state(ExportState::Collecting);
            match self.collect(options, &cancel) {
                Ok(context) => Some(context),
                Err(e) if e.is_cancelled() => {
                    result.warnings.push(MSG_CONTEXT_CANCELLED.to_string());
                    None
                }
                Err(e) => {
                    result.errors.push(format!("Context export failed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        if mode.exports_images(options) {
            self.set_state(ExportState::ImageExporting);
            match self.images.export_all(&self.host, root, options, &cancel) {
                Ok(files) => {
                    if files.is_empty() {
                        result.warnings.push(MSG_NO_IMAGES.to_string());
                    }
                    result.files_created.extend(files);
                }
                Err(e) if e.is_cancelled() => result.warnings.push(MSG_IMAGES_CANCELLED.to_string()),
                Err(e) => result.errors.push(format!("Image export failed: {}", e)),
            }
        }

        if let Some(context) = context {
            self.set_state(ExportState::Serializing);
            match self.writer.write(&context, root) {
                Ok(files) => result.files_created.extend(files),
                Err(e) => result.errors.push(format!("Context export failed: {}", e)),
            }
        }
    }

    fn collect(&self, options: &ExportOptions, cancel: &CancellationToken) -> Result<crate::model::ExportContext> {
        let meta = Meta::new(self.next_timestamp());
        let options = options.clone();
        let cancel = cancel.clone();

        let collection = self
            .host
            .run(move |source| collector::collect_report(source, &options, &cancel, meta))??;
        if !collection.degraded.is_empty() {
            debug!("{} fields degraded during collection", collection.degraded.len());
        }
        Ok(collection.context)
    }

    /// `<project dir>/.arcgispro`, or `None` without a saved project
    fn output_root(&self) -> Result<Option<PathBuf>> {
        let project = self.host.run(|source| source.project())??;
        Ok(project.as_ref().and_then(output_root_for))
    }

    fn set_state(&self, state: ExportState) {
        *self.state.lock() = state;
    }

    /// Strictly increasing across runs of this controller
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let mut last = self.last_stamp.lock();
        let stamp = match *last {
            Some(previous) if now <= previous => previous + chrono::Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

fn finish(mut result: ExportResult, started: Instant) -> ExportResult {
    result.duration = started.elapsed();
    result
}

fn count_layers(source: &dyn crate::source::SourceAdapter) -> HostResult<usize> {
    let mut total = 0;
    for name in source.map_names()? {
        if let Some(map) = source.map(&name)? {
            total += map.layer_count;
        }
    }
    Ok(total)
}

/// Output root for a project: `.arcgispro` beside the project file
pub fn output_root_for(project: &HostProject) -> Option<PathBuf> {
    let path = project.path.as_deref().filter(|p| !p.trim().is_empty())?;
    let dir = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty())?;
    Some(dir.join(OUTPUT_DIR))
}

/// Remove the output root and the legacy markers beside it
pub fn clean_output(root: &Path) -> std::io::Result<()> {
    if root.exists() {
        fs::remove_dir_all(root)?;
    }
    let Some(project_dir) = root.parent() else {
        return Ok(());
    };
    for marker in LEGACY_MARKERS {
        let path = project_dir.join(marker);
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn project_at(path: Option<&str>) -> HostProject {
        HostProject {
            name: "parcels".to_string(),
            path: path.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_output_root_for() {
        assert_eq!(
            output_root_for(&project_at(Some("/gis/parcels/parcels.aprx"))),
            Some(PathBuf::from("/gis/parcels/.arcgispro"))
        );
        assert_eq!(output_root_for(&project_at(None)), None);
        assert_eq!(output_root_for(&project_at(Some("parcels.aprx"))), None);
    }

    #[test]
    fn test_clean_output_removes_root_and_markers() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(OUTPUT_DIR);
        fs::create_dir_all(root.join("context")).unwrap();
        fs::write(root.join("context/maps.json"), "[]").unwrap();
        fs::write(dir.path().join("AGENTS.md"), "old").unwrap();
        fs::write(dir.path().join("parcels.aprx"), "keep").unwrap();

        clean_output(&root).unwrap();
        assert!(!root.exists());
        assert!(!dir.path().join("AGENTS.md").exists());
        assert!(!dir.path().join("agents.md").exists());
        assert!(dir.path().join("parcels.aprx").exists());

        // Nothing to clean is fine
        clean_output(&root).unwrap();
    }

    #[test]
    fn test_mode_phases() {
        let mut options = ExportOptions::default();
        assert!(ExportMode::Snapshot.exports_images(&options));
        options.export_images = false;
        assert!(!ExportMode::Snapshot.exports_images(&options));
        assert!(ExportMode::ImagesOnly.exports_images(&options));
        assert!(!ExportMode::ImagesOnly.exports_context());
        assert!(!ExportMode::ContextOnly.replaces_output());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let controller = ExportController::new(HostQueue::spawn(MemorySource::new()).unwrap());
        let mut previous = controller.next_timestamp();
        for _ in 0..100 {
            let next = controller.next_timestamp();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_initial_state_and_cancel_without_run() {
        let controller = ExportController::new(HostQueue::spawn(MemorySource::new()).unwrap());
        assert_eq!(controller.state(), ExportState::Idle);
        controller.cancel_current();
        assert_eq!(controller.state().to_string(), "idle");
    }
}
