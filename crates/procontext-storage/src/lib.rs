//! procontext-storage - Reading exported context bundles
//!
//! Locates the `.arcgispro` directory of a project and loads its JSON,
//! markdown and diagram files back into the core model.

mod bundle_store;

pub use bundle_store::{BundleStatus, BundleStore, FileState, FileStatus, CONTEXT_FILES};
