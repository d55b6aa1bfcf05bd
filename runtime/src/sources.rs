//! Source descriptor collection.
//!
//! Turns CLI-supplied git paths, archive URLs and additional-sources files
//! into typed descriptors. Every descriptor is classified once, here; the
//! providers dispatch on the variant and never re-inspect strings.
//!
//! # Additional-sources file
//!
//! ```text
//! # comments and blank lines are ignored
//! git@github.com:org/repo.git#4f1c2d9
//! https://github.com/org/other
//! https://example.com/download?file=libfoo-1.2.tar.gz
//! ```
//!
//! A line with a git locator shape is a git locator, with an optional
//! `#<ref>` suffix. Every other line is an archive URL and must use
//! `http` or `https`.

use std::path::{Path, PathBuf};

use deplab_core::error::{DeplabError, Result};
use reqwest::Url;

use crate::git_reference::is_valid_git_reference;

/// A classified source descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Git(GitLocator),
    Archive(ArchiveLocator),
}

/// Remote git repository named by URL rather than by a local checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLocator {
    pub url: String,
    /// Commit or ref pinned with a `#<ref>` suffix
    pub reference: Option<String>,
}

/// Archive to fetch and digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocator {
    pub url: String,
}

/// Something that yields one `git` dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitDescriptor {
    /// Local working tree, inspected with git
    WorkingTree(PathBuf),
    /// Remote locator read from an additional-sources file
    Locator(GitLocator),
}

/// All descriptors of one run, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedSources {
    pub git: Vec<GitDescriptor>,
    pub archives: Vec<ArchiveLocator>,
}

/// Collect descriptors: direct arguments first, then file contents in
/// file order.
pub fn collect_sources(
    git_paths: &[PathBuf],
    archive_urls: &[String],
    additional_sources_files: &[PathBuf],
) -> Result<CollectedSources> {
    let mut sources = CollectedSources {
        git: git_paths
            .iter()
            .cloned()
            .map(GitDescriptor::WorkingTree)
            .collect(),
        archives: archive_urls
            .iter()
            .map(|url| ArchiveLocator { url: url.clone() })
            .collect(),
    };

    for path in additional_sources_files {
        for locator in parse_additional_sources_file(path)? {
            match locator {
                SourceLocator::Git(git) => sources.git.push(GitDescriptor::Locator(git)),
                SourceLocator::Archive(archive) => sources.archives.push(archive),
            }
        }
    }

    tracing::debug!(
        git = sources.git.len(),
        archives = sources.archives.len(),
        "Collected source descriptors"
    );

    Ok(sources)
}

/// Parse one additional-sources file.
pub fn parse_additional_sources_file(path: &Path) -> Result<Vec<SourceLocator>> {
    let content = std::fs::read_to_string(path).map_err(|e| DeplabError::SourcesFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    parse_additional_sources(&content).map_err(|message| DeplabError::SourcesFile {
        path: path.display().to_string(),
        message,
    })
}

fn parse_additional_sources(content: &str) -> std::result::Result<Vec<SourceLocator>, String> {
    let mut locators = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let locator = classify(line).map_err(|e| format!("line {}: {}", idx + 1, e))?;
        locators.push(locator);
    }
    Ok(locators)
}

/// Classify a single descriptor string.
pub fn classify(descriptor: &str) -> std::result::Result<SourceLocator, String> {
    let descriptor = descriptor.trim();
    if descriptor.chars().any(char::is_whitespace) {
        return Err(format!("{:?} contains whitespace", descriptor));
    }

    let (locator, reference) = match descriptor.split_once('#') {
        Some((locator, reference)) => (locator, Some(reference)),
        None => (descriptor, None),
    };
    if is_valid_git_reference(locator) {
        if reference.is_some_and(str::is_empty) {
            return Err(format!("{:?} has an empty ref after '#'", descriptor));
        }
        return Ok(SourceLocator::Git(GitLocator {
            url: locator.to_string(),
            reference: reference.map(str::to_string),
        }));
    }

    let url = Url::parse(descriptor).map_err(|e| {
        format!(
            "{:?} is neither a git locator nor an archive URL: {}",
            descriptor, e
        )
    })?;
    match url.scheme() {
        "http" | "https" => Ok(SourceLocator::Archive(ArchiveLocator {
            url: descriptor.to_string(),
        })),
        scheme => Err(format!(
            "{:?} uses unsupported archive scheme '{}'",
            descriptor, scheme
        )),
    }
}
