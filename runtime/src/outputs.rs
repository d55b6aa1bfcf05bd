//! Metadata and package-list files.

use std::path::Path;

use deplab_core::build_info::BuildInfo;
use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::{DebianPackage, Metadata};

const DPKG_HEADER: [&str; 3] = [
    "Desired=Unknown/Install/Remove/Purge/Hold",
    "| Status=Not/Inst/Conf-files/Unpacked/halF-conf/Half-inst/trig-aWait/Trig-pend",
    "|/ Err?=(none)/Reinst-required (Status,Err: uppercase=bad)",
];

/// Write the metadata document as pretty-printed JSON.
pub fn write_metadata_file(metadata: &Metadata, path: &Path) -> Result<()> {
    let mut content = serde_json::to_string_pretty(metadata)?;
    content.push('\n');
    write_file(path, &content)?;
    tracing::info!(path = %path.display(), "Wrote metadata file");
    Ok(())
}

/// Write a `dpkg -l` style listing of the Debian packages.
pub fn write_dpkg_file(metadata: &Metadata, path: &Path, build: &BuildInfo) -> Result<()> {
    write_file(path, &render_dpkg_list(metadata, build))?;
    tracing::info!(path = %path.display(), "Wrote dpkg file");
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| DeplabError::OutputFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn render_dpkg_list(metadata: &Metadata, build: &BuildInfo) -> String {
    let (packages, digest): (&[DebianPackage], Option<&str>) = match metadata.debian_packages() {
        Some(list) => (list.packages.as_slice(), Some(list.digest.as_str())),
        None => (&[], None),
    };

    let mut out = format!("deplab version: {}\n", build.version);
    if let Some(digest) = digest {
        out.push_str(&format!("deplab SHASUM: {}\n", digest));
    }
    out.push('\n');

    let width = |header: &str, value: fn(&DebianPackage) -> &str| {
        packages
            .iter()
            .map(|p| value(p).len())
            .max()
            .unwrap_or(0)
            .max(header.len())
    };
    let name_width = width("Name", |p| p.name.as_str());
    let version_width = width("Version", |p| p.version.as_str());
    let arch_width = width("Architecture", |p| p.architecture.as_str());

    for line in DPKG_HEADER {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!(
        "||/ {:<nw$} {:<vw$} {}\n",
        "Name",
        "Version",
        "Architecture",
        nw = name_width,
        vw = version_width
    ));
    out.push_str(&format!(
        "+++-{}-{}-{}\n",
        "=".repeat(name_width),
        "=".repeat(version_width),
        "=".repeat(arch_width)
    ));
    for package in packages {
        out.push_str(&format!(
            "ii  {:<nw$} {:<vw$} {}\n",
            package.name,
            package.version,
            package.architecture,
            nw = name_width,
            vw = version_width
        ));
    }
    out
}
