//! Image runtime integration.
//!
//! The runtime (a Docker-compatible daemon) is only needed when the image to
//! annotate is named by reference: the source is exported with `save`, and
//! the annotated archive is handed back with `load`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use deplab_core::error::{DeplabError, Result};
use tokio::process::Command;

const LOADED_IMAGE_ID_PREFIX: &str = "Loaded image ID:";
const LOADED_IMAGE_PREFIX: &str = "Loaded image:";

/// Identifier reported by the runtime after loading an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedImageId {
    /// Untagged image, known by ID (e.g., "sha256:4f1c...")
    Id(String),
    /// Tagged image (e.g., "app:1.0")
    Reference(String),
}

impl LoadedImageId {
    pub fn as_str(&self) -> &str {
        match self {
            LoadedImageId::Id(id) => id,
            LoadedImageId::Reference(reference) => reference,
        }
    }
}

impl std::fmt::Display for LoadedImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the text a runtime prints after `load`.
///
/// Accepts `Loaded image ID: <id>` and `Loaded image: <reference>` lines;
/// progress output before them is ignored and the last such line wins.
pub fn parse_load_output(output: &str) -> Result<LoadedImageId> {
    let mut loaded = None;
    for line in output.lines().map(str::trim) {
        if let Some(id) = line.strip_prefix(LOADED_IMAGE_ID_PREFIX) {
            loaded = Some(LoadedImageId::Id(id.trim().to_string()));
        } else if let Some(reference) = line.strip_prefix(LOADED_IMAGE_PREFIX) {
            loaded = Some(LoadedImageId::Reference(reference.trim().to_string()));
        }
    }

    match loaded {
        Some(id) if !id.as_str().is_empty() => Ok(id),
        _ => Err(DeplabError::UnrecognizedLoadOutput(output.trim().to_string())),
    }
}

/// Operations deplab needs from an image runtime.
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// Write the image named `reference` to an archive at `dest`.
    async fn save(&self, reference: &str, dest: &Path) -> Result<()>;

    /// Load an image archive and report what the runtime calls it.
    async fn load(&self, archive: &Path) -> Result<LoadedImageId>;
}

/// Runtime driven through the `docker` command line.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(timeout: Duration) -> Self {
        Self::with_binary("docker", timeout)
    }

    /// Use a different Docker-compatible binary (e.g., "podman").
    pub fn with_binary(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, subcommand: &str, args: &[&std::ffi::OsStr]) -> Result<String> {
        let command = format!("{} {}", self.binary, subcommand);
        tracing::debug!(command = %command, "Running image runtime command");

        let child = Command::new(&self.binary)
            .arg(subcommand)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                DeplabError::TimeoutError(format!(
                    "`{}` did not finish within {}s",
                    command,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DeplabError::RuntimeCommand {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DeplabError::RuntimeCommand {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ImageRuntime for DockerCli {
    async fn save(&self, reference: &str, dest: &Path) -> Result<()> {
        self.run(
            "save",
            &[reference.as_ref(), "-o".as_ref(), dest.as_os_str()],
        )
        .await?;
        tracing::info!(image = %reference, archive = %dest.display(), "Saved image");
        Ok(())
    }

    async fn load(&self, archive: &Path) -> Result<LoadedImageId> {
        let stdout = self.run("load", &["-i".as_ref(), archive.as_os_str()]).await?;
        let loaded = parse_load_output(&stdout)?;
        tracing::info!(image = %loaded, "Loaded image");
        Ok(loaded)
    }
}
