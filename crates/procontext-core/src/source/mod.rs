//! Host access: the adapter trait, its in-memory implementation and the
//! single-threaded call queue

mod adapter;
pub mod memory;
mod queue;

pub use adapter::{
    ActiveView, DataSource, HostError, HostField, HostLayer, HostLayout, HostMap, HostMapFrame,
    HostProject, HostResult, HostRow, HostTable, HostValue, LayerKind, Page, ProjectItem,
    Renderer, SourceAdapter, SourceRef, SpatialReference,
};
pub use memory::{MemorySource, SourceData};
pub use queue::{HostQueue, DEFAULT_CAPACITY};
