//! Container image support.
//!
//! Reads image archives, exposes the merged layer filesystem to the
//! providers, and writes the annotated result back out:
//!
//! ```text
//! image.tar ──open──► ImageArchive ──layer_paths──► LayerStack (ImageFilesystem)
//!                          │
//!                          └── config + metadata label ──write──► annotated.tar
//! ```

mod archive;
pub mod labels;
mod layers;
pub mod reference;
pub mod runtime;
mod writer;

pub use archive::ImageArchive;
pub use labels::{image_labels, metadata_from_labels, with_metadata_label};
pub use layers::{open_maybe_gzip, ImageFilesystem, LayerStack};
pub use reference::ImageTag;
pub use runtime::{parse_load_output, DockerCli, ImageRuntime, LoadedImageId};
pub use writer::write_docker_archive;
