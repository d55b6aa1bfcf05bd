//! Image archive parsing and representation.
//!
//! Reads the two archive layouts an image runtime produces:
//!
//! ```text
//! docker save                       OCI image layout
//! ├── manifest.json                 ├── oci-layout
//! ├── <config>.json                 ├── index.json
//! └── <layer>/layer.tar             └── blobs/sha256/<manifest|config|layer>
//! ```
//!
//! The archive (optionally gzip-compressed as a whole) is unpacked into a
//! private staging directory that lives as long as the `ImageArchive`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use deplab_core::error::{DeplabError, Result};
use oci_spec::image::{ImageIndex, ImageManifest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tar::Archive;
use tempfile::TempDir;

use super::labels;
use super::layers::open_maybe_gzip;

/// One entry of a `docker save` manifest.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DockerManifestEntry {
    pub config: String,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    pub layers: Vec<String>,
}

/// An image archive unpacked to disk.
#[derive(Debug)]
pub struct ImageArchive {
    /// Unpacked archive contents
    staging: TempDir,

    /// Config blob path, relative to the staging root
    config_path: String,

    /// Raw config blob bytes
    config_bytes: Vec<u8>,

    /// Parsed image configuration
    config: serde_json::Value,

    /// Layer blob paths relative to the staging root (bottom to top)
    layers: Vec<String>,

    /// Tags recorded in the archive
    repo_tags: Vec<String>,
}

impl ImageArchive {
    /// Unpack and parse an image archive.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The archive cannot be read or unpacked
    /// - Neither `manifest.json` nor an OCI `index.json` is present
    /// - The manifest references a config or layer that is missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let source = path.as_ref().to_path_buf();
        let staging = tempfile::tempdir().map_err(|e| {
            DeplabError::OciImageError(format!("Failed to create staging directory: {}", e))
        })?;

        let reader = open_maybe_gzip(&source)?;
        Archive::new(reader).unpack(staging.path()).map_err(|e| {
            DeplabError::OciImageError(format!(
                "Failed to extract image archive {}: {}",
                source.display(),
                e
            ))
        })?;

        let root = staging.path();
        let (config_path, layers, repo_tags) = if root.join("manifest.json").exists() {
            Self::read_docker_manifest(root)?
        } else if root.join("index.json").exists() {
            Self::read_oci_layout(root)?
        } else {
            return Err(DeplabError::OciImageError(format!(
                "Not an image archive: {} has neither manifest.json nor index.json",
                source.display()
            )));
        };

        let config_bytes = std::fs::read(root.join(&config_path)).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to read config {}: {}", config_path, e))
        })?;
        let config: serde_json::Value = serde_json::from_slice(&config_bytes).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to parse config {}: {}", config_path, e))
        })?;

        for layer in &layers {
            if !root.join(layer).is_file() {
                return Err(DeplabError::OciImageError(format!(
                    "Layer {} listed in manifest is missing from {}",
                    layer,
                    source.display()
                )));
            }
        }

        tracing::debug!(
            archive = %source.display(),
            layers = layers.len(),
            "Opened image archive"
        );

        Ok(Self {
            staging,
            config_path,
            config_bytes,
            config,
            layers,
            repo_tags,
        })
    }

    /// Parse a `docker save` manifest.json.
    fn read_docker_manifest(root: &Path) -> Result<(String, Vec<String>, Vec<String>)> {
        let content = std::fs::read_to_string(root.join("manifest.json")).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to read manifest.json: {}", e))
        })?;
        let entries: Vec<DockerManifestEntry> = serde_json::from_str(&content).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to parse manifest.json: {}", e))
        })?;

        if entries.len() > 1 {
            tracing::warn!(
                images = entries.len(),
                "Archive holds several images, using the first"
            );
        }
        let entry = entries.into_iter().next().ok_or_else(|| {
            DeplabError::OciImageError("No images in manifest.json".to_string())
        })?;

        Ok((
            entry.config,
            entry.layers,
            entry.repo_tags.unwrap_or_default(),
        ))
    }

    /// Parse an OCI image layout (index.json → manifest → config).
    fn read_oci_layout(root: &Path) -> Result<(String, Vec<String>, Vec<String>)> {
        let content = std::fs::read_to_string(root.join("index.json")).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to read index.json: {}", e))
        })?;
        let index: ImageIndex = serde_json::from_str(&content).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to parse index.json: {}", e))
        })?;

        let descriptor = index.manifests().first().ok_or_else(|| {
            DeplabError::OciImageError("No manifests in index.json".to_string())
        })?;
        let repo_tags = descriptor
            .annotations()
            .as_ref()
            .and_then(|a| a.get("org.opencontainers.image.ref.name"))
            .map(|name| vec![name.clone()])
            .unwrap_or_default();

        let manifest_path = blob_path(&descriptor.digest().to_string());
        let manifest_content = std::fs::read_to_string(root.join(&manifest_path)).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to read manifest {}: {}", manifest_path, e))
        })?;
        let manifest: ImageManifest = serde_json::from_str(&manifest_content).map_err(|e| {
            DeplabError::OciImageError(format!("Failed to parse manifest: {}", e))
        })?;

        let config_path = blob_path(&manifest.config().digest().to_string());
        let layers = manifest
            .layers()
            .iter()
            .map(|layer| blob_path(&layer.digest().to_string()))
            .collect();

        Ok((config_path, layers, repo_tags))
    }

    /// Root of the unpacked archive.
    pub fn root_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Image configuration as stored in the archive.
    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }

    /// Config blob path relative to the archive root.
    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    /// Layer blob paths relative to the archive root (bottom to top).
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Tags recorded in the archive.
    pub fn repo_tags(&self) -> &[String] {
        &self.repo_tags
    }

    /// Image ID: digest of the config blob.
    pub fn image_id(&self) -> String {
        format!("sha256:{:x}", Sha256::digest(&self.config_bytes))
    }

    /// Image labels.
    pub fn labels(&self) -> HashMap<String, String> {
        labels::image_labels(&self.config)
    }

    /// Absolute paths of the unpacked layer blobs (bottom to top).
    pub fn layer_paths(&self) -> Vec<PathBuf> {
        self.layers
            .iter()
            .map(|layer| self.root_dir().join(layer))
            .collect()
    }
}

/// Relative path of a blob in an OCI layout.
fn blob_path(digest: &str) -> String {
    match digest.split_once(':') {
        Some((algorithm, hash)) => format!("blobs/{}/{}", algorithm, hash),
        None => format!("blobs/sha256/{}", digest),
    }
}
