//! `deplab inspect` command: print the metadata label of an image.

use clap::Args;
use deplab_core::build_info::BuildInfo;
use deplab_core::metadata::METADATA_LABEL;
use deplab_runtime::{DockerCli, LoadedImage};

use super::ImageArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Print a dependency table instead of JSON
    #[arg(short, long)]
    pub summary: bool,

    /// Timeout for the image runtime, in seconds
    #[arg(long, default_value_t = 600)]
    pub command_timeout: u64,

    /// Docker-compatible binary used for --image references
    #[arg(long, default_value = "docker")]
    pub runtime: String,
}

pub async fn execute(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let input = args
        .image
        .input()
        .ok_or("one of --image or --image-tar is required")?;
    let runtime = DockerCli::with_binary(
        args.runtime,
        std::time::Duration::from_secs(args.command_timeout),
    );

    let image = LoadedImage::resolve(&input, &runtime).await?;
    let metadata = image.metadata()?.ok_or_else(|| {
        format!(
            "Image {} has no {} label",
            input.describe(),
            METADATA_LABEL
        )
    })?;

    if args.summary {
        let provenance = metadata
            .provenance
            .first()
            .cloned()
            .unwrap_or_else(|| BuildInfo::current().provenance());
        println!("Image:      {}", image.image_id());
        println!(
            "Base:       {} {} ({})",
            metadata.base.name, metadata.base.version_id, metadata.base.version_codename
        );
        println!("Labelled by {} {}", provenance.name, provenance.version);
        println!();

        let mut table = output::new_table(&["TYPE", "SOURCE", "VERSION"]);
        for row in output::dependency_rows(&metadata) {
            table.add_row(row);
        }
        println!("{table}");
    } else {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    }
    Ok(())
}
