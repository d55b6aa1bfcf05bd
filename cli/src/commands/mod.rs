//! CLI command definitions and dispatch.
//!
//! Labelling is the default action, so its flags live on the top-level
//! command; `inspect` and `version` are subcommands.

mod inspect;
mod label;
mod version;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use deplab_core::config::ImageInput;

pub use label::LabelArgs;

/// Record the dependencies of a container image in an image label.
#[derive(Parser, Debug)]
#[command(
    name = "deplab",
    version = deplab_core::build_info::VERSION,
    about,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub label: LabelArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the dependency metadata stored in an image
    Inspect(inspect::InspectArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Image selection shared by commands that read an image.
#[derive(Args, Debug, Clone, Default)]
pub struct ImageArgs {
    /// Image reference, exported from the local image runtime
    #[arg(short, long, conflicts_with = "image_tar")]
    pub image: Option<String>,

    /// Image archive (docker save or OCI layout, optionally gzipped)
    #[arg(short = 'p', long)]
    pub image_tar: Option<PathBuf>,
}

impl ImageArgs {
    /// The selected image, if any flag was given.
    pub fn input(&self) -> Option<ImageInput> {
        match (&self.image, &self.image_tar) {
            (_, Some(path)) => Some(ImageInput::Archive(path.clone())),
            (Some(reference), None) => Some(ImageInput::Reference(reference.clone())),
            (None, None) => None,
        }
    }
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let name = match &cli.command {
        Some(Command::Inspect(_)) => "inspect",
        Some(Command::Version(_)) => "version",
        None => "label",
    };
    tracing::debug!(command = name, "Dispatching command");

    match cli.command {
        Some(Command::Inspect(args)) => inspect::execute(args).await,
        Some(Command::Version(args)) => version::execute(args).await,
        None => label::execute(cli.label).await,
    }
}
