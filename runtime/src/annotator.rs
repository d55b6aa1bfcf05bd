//! Image annotation.
//!
//! ```text
//! ImageInput ──resolve──► LoadedImage ──annotate──► AnnotatedImage ──with_tag──► export / load_into
//! ```
//!
//! Annotation rewrites only the image config: the metadata label is added,
//! layers are reused as they are, and the new image is identified by the
//! digest of the rewritten config.

use std::path::Path;

use deplab_core::config::ImageInput;
use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::Metadata;
use sha2::{Digest, Sha256};

use crate::oci::{
    metadata_from_labels, with_metadata_label, write_docker_archive, ImageArchive, ImageRuntime,
    ImageTag, LoadedImageId,
};

/// Source image, unpacked and ready for inspection.
#[derive(Debug)]
pub struct LoadedImage {
    archive: ImageArchive,
}

impl LoadedImage {
    /// Obtain the source image.
    ///
    /// Archives are read directly; references are exported from the runtime
    /// first.
    pub async fn resolve(input: &ImageInput, runtime: &dyn ImageRuntime) -> Result<Self> {
        let archive = match input {
            ImageInput::Archive(path) => open_archive(path.clone()).await?,
            ImageInput::Reference(reference) => {
                let staging = tempfile::tempdir()?;
                let saved = staging.path().join("source.tar");
                runtime.save(reference, &saved).await?;
                open_archive(saved).await?
            }
        };

        tracing::info!(
            image = %input.describe(),
            id = %archive.image_id(),
            "Resolved source image"
        );
        Ok(Self { archive })
    }

    pub fn from_archive(archive: ImageArchive) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &ImageArchive {
        &self.archive
    }

    pub fn image_id(&self) -> String {
        self.archive.image_id()
    }

    /// Metadata already carried by the image, if any.
    pub fn metadata(&self) -> Result<Option<Metadata>> {
        metadata_from_labels(&self.archive.labels())
    }

    /// Produce a new image config carrying `metadata` as its label.
    pub fn annotate(&self, metadata: &Metadata) -> Result<AnnotatedImage<'_>> {
        let config = with_metadata_label(self.archive.config(), metadata)?;
        let config_bytes = serde_json::to_vec(&config)?;
        let digest = format!("sha256:{:x}", Sha256::digest(&config_bytes));

        tracing::debug!(digest = %digest, "Annotated image config");
        Ok(AnnotatedImage {
            source: &self.archive,
            config_bytes,
            digest,
            tag: None,
        })
    }
}

async fn open_archive(path: std::path::PathBuf) -> Result<ImageArchive> {
    tokio::task::spawn_blocking(move || ImageArchive::open(path))
        .await
        .map_err(|e| DeplabError::OciImageError(format!("Archive reader task failed: {}", e)))?
}

/// Source image with a rewritten config.
#[derive(Debug)]
pub struct AnnotatedImage<'a> {
    source: &'a ImageArchive,
    config_bytes: Vec<u8>,
    digest: String,
    tag: Option<ImageTag>,
}

impl<'a> AnnotatedImage<'a> {
    /// Name the image. `None` leaves it addressable by digest only.
    pub fn with_tag(mut self, tag: Option<ImageTag>) -> Self {
        self.tag = tag;
        self
    }

    /// Image ID of the annotated image.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Tag if set, digest otherwise.
    pub fn reference(&self) -> String {
        match &self.tag {
            Some(tag) => tag.full_reference(),
            None => self.digest.clone(),
        }
    }

    /// Write the annotated image as a docker-save archive.
    pub fn export(&self, dest: &Path) -> Result<()> {
        write_docker_archive(self.source, &self.config_bytes, self.tag.as_ref(), dest)?;
        tracing::info!(image = %self.reference(), archive = %dest.display(), "Exported image");
        Ok(())
    }

    /// Hand the annotated image to the runtime.
    pub async fn load_into(&self, runtime: &dyn ImageRuntime) -> Result<LoadedImageId> {
        let staging = tempfile::tempdir()?;
        let archive = staging.path().join("annotated.tar");
        self.export(&archive)?;
        runtime.load(&archive).await
    }
}
