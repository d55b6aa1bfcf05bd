//! Debian package provider.
//!
//! Reads the dpkg database straight out of the image layers:
//!
//! - `var/lib/dpkg/status`: the regular database
//! - `var/lib/dpkg/status.d/*`: one file per package (distroless images)
//!
//! Apt sources come from `etc/apt/sources.list` and
//! `etc/apt/sources.list.d/*.list`.

use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::{DebianPackage, DebianPackageList};

use crate::oci::ImageFilesystem;

const STATUS_FILE: &str = "var/lib/dpkg/status";
const STATUS_DIR: &str = "var/lib/dpkg/status.d";
const SOURCES_LIST: &str = "etc/apt/sources.list";
const SOURCES_LIST_DIR: &str = "etc/apt/sources.list.d";

/// Installed packages of the image, or `None` when there are none.
pub fn debian_packages(fs: &dyn ImageFilesystem) -> Result<Option<DebianPackageList>> {
    let mut packages = Vec::new();

    if let Some(content) = fs.read_file(STATUS_FILE).map_err(wrap)? {
        packages.extend(parse_status(&String::from_utf8_lossy(&content), STATUS_FILE)?);
    }

    for (name, content) in fs.read_dir(STATUS_DIR).map_err(wrap)? {
        if name.ends_with(".md5sums") {
            continue;
        }
        let source = format!("{}/{}", STATUS_DIR, name);
        packages.extend(parse_status(&String::from_utf8_lossy(&content), &source)?);
    }

    if packages.is_empty() {
        tracing::debug!("No dpkg database found in image");
        return Ok(None);
    }

    let apt_sources = apt_sources(fs)?;
    tracing::debug!(
        count = packages.len(),
        apt_sources = apt_sources.len(),
        "Read dpkg database"
    );
    Ok(Some(DebianPackageList::new(packages, apt_sources)))
}

fn wrap(err: DeplabError) -> DeplabError {
    DeplabError::DebianMetadata(err.to_string())
}

/// Parse dpkg status stanzas, keeping installed packages in file order.
///
/// A stanza without a `Status` field counts as installed.
fn parse_status(content: &str, source: &str) -> Result<Vec<DebianPackage>> {
    let mut packages = Vec::new();
    for stanza in content.split("\n\n") {
        let stanza = stanza.trim_matches('\n');
        if stanza.trim().is_empty() {
            continue;
        }

        let mut package = None;
        let mut version = None;
        let mut architecture = None;
        let mut status = None;
        for line in stanza.lines() {
            // Continuation of a multi-line field
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(DeplabError::DebianMetadata(format!(
                    "{}: malformed line '{}'",
                    source, line
                )));
            };
            let value = value.trim();
            match key {
                "Package" => package = Some(value),
                "Version" => version = Some(value),
                "Architecture" => architecture = Some(value),
                "Status" => status = Some(value),
                _ => {}
            }
        }

        let Some(name) = package else {
            return Err(DeplabError::DebianMetadata(format!(
                "{}: stanza without a Package field",
                source
            )));
        };
        if let Some(status) = status {
            if status.split_whitespace().last() != Some("installed") {
                continue;
            }
        }
        let field = |value: Option<&str>, field: &str| {
            value.map(str::to_string).ok_or_else(|| {
                DeplabError::DebianMetadata(format!(
                    "{}: package {} has no {} field",
                    source, name, field
                ))
            })
        };

        packages.push(DebianPackage {
            name: name.to_string(),
            version: field(version, "Version")?,
            architecture: field(architecture, "Architecture")?,
        });
    }
    Ok(packages)
}

/// `deb` and `deb-src` lines of the apt configuration, in file order.
fn apt_sources(fs: &dyn ImageFilesystem) -> Result<Vec<String>> {
    let mut files = Vec::new();
    if let Some(content) = fs.read_file(SOURCES_LIST).map_err(wrap)? {
        files.push(content);
    }
    for (name, content) in fs.read_dir(SOURCES_LIST_DIR).map_err(wrap)? {
        if name.ends_with(".list") {
            files.push(content);
        }
    }

    Ok(files
        .iter()
        .flat_map(|content| {
            String::from_utf8_lossy(content)
                .lines()
                .map(str::trim)
                .filter(|line| line.starts_with("deb ") || line.starts_with("deb-src "))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect())
}
