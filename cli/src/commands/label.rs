//! Default `deplab` action: label an image with its dependency metadata.

use std::path::PathBuf;

use clap::Args;
use deplab_core::build_info::BuildInfo;
use deplab_core::config::{OutputPaths, RunConfig, TimeoutConfig};
use deplab_runtime::DockerCli;

use super::ImageArgs;

#[derive(Args, Debug, Clone)]
pub struct LabelArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Local git working tree the image was built from (repeatable)
    #[arg(short, long)]
    pub git: Vec<PathBuf>,

    /// URL of a source archive to fetch and digest (repeatable)
    #[arg(short = 'u', long = "additional-source-url")]
    pub additional_source_urls: Vec<String>,

    /// File listing one archive URL or git locator per line (repeatable)
    #[arg(short = 'a', long = "additional-sources-file")]
    pub additional_sources_files: Vec<PathBuf>,

    /// Tag for the labelled image (e.g., "app:1.0"; "app" means "app:latest")
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Write the metadata document to this file
    #[arg(short, long)]
    pub metadata_file: Option<PathBuf>,

    /// Write a dpkg -l style package list to this file
    #[arg(short, long)]
    pub dpkg_file: Option<PathBuf>,

    /// Write the labelled image to this archive
    #[arg(short, long)]
    pub output_tar: Option<PathBuf>,

    /// Timeout for each archive download, in seconds
    #[arg(long, default_value_t = 300)]
    pub fetch_timeout: u64,

    /// Timeout for each git or image runtime command, in seconds
    #[arg(long, default_value_t = 600)]
    pub command_timeout: u64,

    /// Docker-compatible binary that saves and loads images
    #[arg(long, default_value = "docker")]
    pub runtime: String,
}

impl LabelArgs {
    /// Build the run configuration.
    pub fn into_config(self) -> Result<RunConfig, String> {
        let image = self
            .image
            .input()
            .ok_or("one of --image or --image-tar is required")?;

        Ok(RunConfig {
            image,
            git_paths: self.git,
            archive_urls: self.additional_source_urls,
            additional_sources_files: self.additional_sources_files,
            tag: self.tag,
            outputs: OutputPaths {
                metadata_file: self.metadata_file,
                dpkg_file: self.dpkg_file,
                output_tar: self.output_tar,
            },
            timeouts: TimeoutConfig {
                fetch_secs: self.fetch_timeout,
                command_secs: self.command_timeout,
            },
        })
    }
}

pub async fn execute(args: LabelArgs) -> Result<(), Box<dyn std::error::Error>> {
    let binary = args.runtime.clone();
    let config = args.into_config()?;
    let build = BuildInfo::current();
    tracing::debug!(image = %config.image.describe(), runtime = %binary, "Starting label run");
    let runtime = DockerCli::with_binary(binary, config.timeouts.command());

    let report = deplab_runtime::run(&config, &build, &runtime).await?;

    tracing::debug!(source = %report.source_id, id = %report.image_id, "Label run finished");
    println!("{}", report.loaded);
    Ok(())
}
