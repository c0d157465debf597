//! Bundle serialization
//!
//! A [`BundleWriter`] runs a list of [`Renderer`]s over one
//! [`ExportContext`](crate::model::ExportContext) and writes each artifact
//! atomically under the output root:
//!
//! - `meta.json` and `context/*.json`, one document per collection
//! - `snapshot/context.md`, the markdown digest
//! - `snapshot/project-structure.{mmd,md}`, the dependency diagram
//! - `AGENTS.md` beside the output root, and `active_project.txt`
//!
//! # Example
//!
//! ```ignore
//! use procontext_core::export::BundleWriter;
//!
//! let files = BundleWriter::new().write(&context, &output_root)?;
//! ```

mod diagram;
mod exporter;
mod json;
mod markdown;

pub use diagram::{
    escape_label, shared_layer_names, DependencyGraph, DiagramDocument, DiagramSource, Edge, Node,
    NodeKind,
};
pub use exporter::{write_atomic, ActiveProjectMarker, BundleWriter, Location, Renderer};
pub use json::JsonSection;
pub use markdown::{thousands, AgentsGuide, ContextMarkdown};
