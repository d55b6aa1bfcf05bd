//! Deplab Runtime - dependency metadata pipeline.
//!
//! This crate collects dependency facts about a container image (Debian
//! packages, git sources, fetched archives, base OS), assembles them into one
//! metadata document, and writes it as a label on a new image.

#![allow(clippy::result_large_err)]

pub mod annotator;
pub mod assembler;
pub mod git_reference;
pub mod oci;
pub mod outputs;
pub mod pipeline;
pub mod providers;
pub mod sources;

// Re-export common types
pub use annotator::{AnnotatedImage, LoadedImage};
pub use assembler::{assemble, ProviderOutputs};
pub use git_reference::is_valid_git_reference;
pub use oci::{DockerCli, ImageArchive, ImageFilesystem, ImageRuntime, ImageTag, LoadedImageId};
pub use pipeline::{run, RunReport};
pub use sources::{collect_sources, CollectedSources, GitDescriptor, SourceLocator};
