//! procontext-core - Core library for procontext
//!
//! Collects a read-only snapshot of an open GIS project through a
//! [`source::SourceAdapter`] and writes it as a bundle of JSON, markdown,
//! diagram and image files under `<project dir>/.arcgispro`.

pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod images;
pub mod model;
pub mod orchestrator;
pub mod source;
pub mod stable_id;

pub use config::{Config, ExportOptions, MapFilter};
pub use error::{ProContextError, Result};
pub use model::*;
pub use orchestrator::{ExportController, ExportState};

/// Name of the bundle directory created beside the project file
pub const OUTPUT_DIR: &str = ".arcgispro";
