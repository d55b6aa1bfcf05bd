//! Deplab Core - Foundational Types
//!
//! The dependency metadata model, error taxonomy, build identity and run
//! configuration shared by the deplab runtime and CLI.

pub mod build_info;
pub mod config;
pub mod error;
pub mod metadata;

// Re-export commonly used types
pub use build_info::BuildInfo;
pub use config::{ImageInput, OutputPaths, RunConfig, TimeoutConfig};
pub use error::{DeplabError, Result};
pub use metadata::{
    ArchiveSource, BaseInfo, Checksum, DebianPackage, DebianPackageList, Dependency, GitSource,
    Metadata, Provenance, METADATA_LABEL,
};
