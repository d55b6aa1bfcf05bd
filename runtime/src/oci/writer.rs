//! Export of annotated images as `docker save` archives.
//!
//! The written archive reuses the source layers unchanged and replaces the
//! config blob, so only the config (and therefore the image ID) differs from
//! the input image.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use deplab_core::error::{DeplabError, Result};
use sha2::{Digest, Sha256};

use super::archive::{DockerManifestEntry, ImageArchive};
use super::reference::ImageTag;

/// Write `source` with `config_bytes` as its config to a docker-save archive.
///
/// A partially written file is removed on failure.
pub fn write_docker_archive(
    source: &ImageArchive,
    config_bytes: &[u8],
    tag: Option<&ImageTag>,
    dest: &Path,
) -> Result<()> {
    let export_error = |message: String| DeplabError::Export {
        path: dest.display().to_string(),
        message,
    };

    let file = File::create(dest).map_err(|e| export_error(e.to_string()))?;

    let result = append_entries(file, source, config_bytes, tag).map_err(export_error);
    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    } else {
        tracing::debug!(archive = %dest.display(), "Wrote image archive");
    }
    result
}

fn append_entries(
    file: File,
    source: &ImageArchive,
    config_bytes: &[u8],
    tag: Option<&ImageTag>,
) -> std::result::Result<(), String> {
    let mut builder = tar::Builder::new(file);

    let mut written = HashSet::new();
    for layer in source.layers() {
        if !written.insert(layer.as_str()) {
            continue;
        }
        builder
            .append_path_with_name(source.root_dir().join(layer), layer)
            .map_err(|e| format!("failed to archive layer {}: {}", layer, e))?;
    }

    let config_name = format!("{:x}.json", Sha256::digest(config_bytes));
    append_bytes(&mut builder, &config_name, config_bytes)?;

    let manifest = vec![DockerManifestEntry {
        config: config_name,
        repo_tags: tag.map(|t| vec![t.full_reference()]),
        layers: source.layers().to_vec(),
    }];
    let manifest = serde_json::to_vec(&manifest)
        .map_err(|e| format!("failed to serialize manifest.json: {}", e))?;
    append_bytes(&mut builder, "manifest.json", &manifest)?;

    builder
        .into_inner()
        .and_then(|file| file.sync_all())
        .map_err(|e| format!("failed to finalize archive: {}", e))
}

fn append_bytes(
    builder: &mut tar::Builder<File>,
    name: &str,
    content: &[u8],
) -> std::result::Result<(), String> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(&mut header, name, content)
        .map_err(|e| format!("failed to archive {}: {}", name, e))
}
