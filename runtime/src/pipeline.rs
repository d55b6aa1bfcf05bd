//! End-to-end labelling run.
//!
//! ```text
//! RunConfig
//!   ├─ tag ──────────────► ImageTag::parse            (fail before any work)
//!   ├─ sources ──────────► collect_sources
//!   ├─ image ────────────► LoadedImage::resolve
//!   │
//!   ├─ debian + base ─┐
//!   ├─ git (each) ────┼──► try_join ──► assemble ──► annotate ──► with_tag
//!   └─ archives ──────┘                                  │
//!                                         metadata file ◄┤
//!                                         dpkg file ◄────┤
//!                                         output tar ◄───┤
//!                                         runtime load ◄─┘
//! ```
//!
//! Providers run concurrently; the first failure cancels the rest and is the
//! run's only error.

use deplab_core::build_info::BuildInfo;
use deplab_core::config::{RunConfig, TimeoutConfig};
use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::Metadata;
use futures::future::try_join_all;

use crate::annotator::LoadedImage;
use crate::assembler::{assemble, ProviderOutputs};
use crate::oci::{ImageRuntime, ImageTag, LayerStack, LoadedImageId};
use crate::outputs::{write_dpkg_file, write_metadata_file};
use crate::providers::{
    archive_dependency, base_metadata, debian_packages, git_dependency, http_client,
};
use crate::sources::{collect_sources, CollectedSources};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Metadata written to the label
    pub metadata: Metadata,
    /// Image ID of the source image
    pub source_id: String,
    /// Image ID of the annotated image
    pub image_id: String,
    /// Tag if one was given, image ID otherwise
    pub reference: String,
    /// What the runtime reported after loading the annotated image
    pub loaded: LoadedImageId,
}

/// Label one image.
pub async fn run(
    config: &RunConfig,
    build: &BuildInfo,
    runtime: &dyn ImageRuntime,
) -> Result<RunReport> {
    let tag = match config.tag.as_deref() {
        Some(tag) => ImageTag::parse(tag)?,
        None => None,
    };

    let sources = collect_sources(
        &config.git_paths,
        &config.archive_urls,
        &config.additional_sources_files,
    )?;

    let image = LoadedImage::resolve(&config.image, runtime).await?;
    let outputs = gather(&image, &sources, &config.timeouts).await?;
    let metadata = assemble(outputs, build);

    let annotated = image.annotate(&metadata)?.with_tag(tag);

    if let Some(path) = &config.outputs.metadata_file {
        write_metadata_file(&metadata, path)?;
    }
    if let Some(path) = &config.outputs.dpkg_file {
        write_dpkg_file(&metadata, path, build)?;
    }
    if let Some(path) = &config.outputs.output_tar {
        annotated.export(path)?;
    }

    let loaded = annotated.load_into(runtime).await?;

    tracing::info!(
        image = %annotated.reference(),
        id = %annotated.digest(),
        dependencies = metadata.dependencies.len(),
        "Labelled image"
    );

    Ok(RunReport {
        source_id: image.image_id(),
        image_id: annotated.digest().to_string(),
        reference: annotated.reference(),
        loaded,
        metadata,
    })
}

/// Run all providers under one join barrier.
async fn gather(
    image: &LoadedImage,
    sources: &CollectedSources,
    timeouts: &TimeoutConfig,
) -> Result<ProviderOutputs> {
    let layer_paths = image.archive().layer_paths();
    let inspect = async move {
        tokio::task::spawn_blocking(move || {
            let layers = LayerStack::open(layer_paths)?;
            let debian = debian_packages(&layers)?;
            let base = base_metadata(&layers);
            Ok::<_, DeplabError>((debian, base))
        })
        .await
        .map_err(|e| DeplabError::OciImageError(format!("Image inspection task failed: {}", e)))?
    };

    let command_timeout = timeouts.command();
    let git = try_join_all(
        sources
            .git
            .iter()
            .map(|descriptor| git_dependency(descriptor, command_timeout)),
    );

    let client = http_client(timeouts.fetch())?;
    let archives = try_join_all(
        sources
            .archives
            .iter()
            .map(|locator| archive_dependency(&client, locator)),
    );

    let ((debian, base), git, archives) = tokio::try_join!(inspect, git, archives)?;

    Ok(ProviderOutputs {
        base,
        debian,
        git,
        archives,
    })
}
