use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Image to annotate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageInput {
    /// Image already known to the image runtime (e.g., "ubuntu:22.04")
    Reference(String),

    /// Local image archive (Docker save or OCI layout, optionally gzipped)
    Archive(PathBuf),
}

impl ImageInput {
    /// Human-readable description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            ImageInput::Reference(reference) => reference.clone(),
            ImageInput::Archive(path) => path.display().to_string(),
        }
    }
}

/// Inputs of a single labelling run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Image to inspect and annotate
    pub image: ImageInput,

    /// Local git working trees
    pub git_paths: Vec<PathBuf>,

    /// Archive URLs given directly
    pub archive_urls: Vec<String>,

    /// Line-oriented files listing further archive URLs and git locators
    pub additional_sources_files: Vec<PathBuf>,

    /// Tag for the annotated image (empty means untagged)
    pub tag: Option<String>,

    /// Output destinations
    pub outputs: OutputPaths,

    /// Timeouts for external calls
    pub timeouts: TimeoutConfig,
}

impl RunConfig {
    pub fn new(image: ImageInput) -> Self {
        Self {
            image,
            git_paths: Vec::new(),
            archive_urls: Vec::new(),
            additional_sources_files: Vec::new(),
            tag: None,
            outputs: OutputPaths::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Where run results are written. Every destination is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Pretty-printed metadata JSON
    pub metadata_file: Option<PathBuf>,

    /// dpkg-style package listing
    pub dpkg_file: Option<PathBuf>,

    /// Annotated image archive
    pub output_tar: Option<PathBuf>,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-archive download timeout in seconds
    pub fetch_secs: u64,

    /// Per external command (docker, git) timeout in seconds
    pub command_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch_secs: 300,
            command_secs: 600,
        }
    }
}

impl TimeoutConfig {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }
}
