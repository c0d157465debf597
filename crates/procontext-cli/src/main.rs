//! procontext - Query the exported context of an ArcGIS Pro project
//!
//! Reads the `.arcgispro` bundle written next to a project file.
//!
//! ## Quick Start
//!
//! ```bash
//! # Is the export complete?
//! procontext status
//!
//! # What is in the project?
//! procontext maps
//! procontext layers --map "Main Map" --broken
//! procontext layer roads --json
//!
//! # Full summary for an agent or a human
//! procontext context
//! ```

mod commands;

fn main() {
    if let Err(err) = commands::run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
