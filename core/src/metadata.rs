//! Dependency metadata document.
//!
//! The `Metadata` value is the single unit deplab serializes: it is written
//! as one image label (see [`METADATA_LABEL`]) and, optionally, as a
//! standalone JSON file. Both encodings decode to the same value.
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "base": { "name": "Ubuntu", "version_id": "22.04", "version_codename": "jammy" },
//!   "provenance": [{ "name": "deplab", "version": "0.4.0", "url": "https://..." }],
//!   "dependencies": [
//!     { "type": "debian_packages", "packages": [...], "apt_sources": [...], "digest": "sha256:..." },
//!     { "type": "git", "url": "git@github.com:org/repo.git", "commit": "4f1c..." },
//!     { "type": "archive", "url": "https://...", "checksum": { "algorithm": "sha256", "value": "..." } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Label key carrying the serialized metadata on annotated images.
pub const METADATA_LABEL: &str = "io.deplab.metadata";

/// Value used for every `BaseInfo` field when the OS cannot be identified.
pub const UNKNOWN: &str = "unknown";

/// Canonical provenance document for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Operating system the image is based on
    pub base: BaseInfo,
    /// Tools that produced this document
    pub provenance: Vec<Provenance>,
    /// Collected dependencies, in assembly order
    pub dependencies: Vec<Dependency>,
}

impl Metadata {
    /// The Debian package set, if the image has one.
    pub fn debian_packages(&self) -> Option<&DebianPackageList> {
        self.dependencies.iter().find_map(|dep| match dep {
            Dependency::DebianPackages(list) => Some(list),
            _ => None,
        })
    }

    /// Compact JSON used as the label value.
    pub fn to_label_value(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a label value written by [`Metadata::to_label_value`].
    pub fn from_label_value(value: &str) -> Result<Self> {
        Ok(serde_json::from_str(value)?)
    }
}

/// Operating system identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseInfo {
    pub name: String,
    pub version_id: String,
    pub version_codename: String,
}

impl BaseInfo {
    /// Sentinel for images without a recognizable release file.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            version_id: UNKNOWN.to_string(),
            version_codename: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self == &Self::unknown()
    }
}

impl Default for BaseInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Identifies the tool that generated a metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub name: String,
    pub version: String,
    pub url: String,
}

/// One recorded unit of provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dependency {
    /// Installed Debian packages
    DebianPackages(DebianPackageList),
    /// A version-controlled source checkout
    Git(GitSource),
    /// A fetched archive, identified by its content digest
    Archive(ArchiveSource),
}

impl Dependency {
    /// The `type` tag this record serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Dependency::DebianPackages(_) => "debian_packages",
            Dependency::Git(_) => "git",
            Dependency::Archive(_) => "archive",
        }
    }
}

/// Packages reported by the image's dpkg database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebianPackageList {
    /// Packages in database order
    pub packages: Vec<DebianPackage>,
    /// `deb` lines from the image's apt configuration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apt_sources: Vec<String>,
    /// `sha256:<hex>` over the package list
    pub digest: String,
}

impl DebianPackageList {
    pub fn new(packages: Vec<DebianPackage>, apt_sources: Vec<String>) -> Self {
        let digest = packages_digest(&packages);
        Self {
            packages,
            apt_sources,
            digest,
        }
    }
}

/// A single installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebianPackage {
    pub name: String,
    pub version: String,
    pub architecture: String,
}

/// Source checkout identified by remote and revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Tags pointing at the recorded commit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
}

/// Fetched archive with the digest of the bytes actually retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSource {
    pub url: String,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: String,
    pub value: String,
}

impl Checksum {
    pub fn sha256(hex_value: impl Into<String>) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            value: hex_value.into(),
        }
    }
}

/// Digest over one `name\tversion\tarchitecture\n` line per package.
fn packages_digest(packages: &[DebianPackage]) -> String {
    let mut hasher = Sha256::new();
    for pkg in packages {
        hasher.update(pkg.name.as_bytes());
        hasher.update(b"\t");
        hasher.update(pkg.version.as_bytes());
        hasher.update(b"\t");
        hasher.update(pkg.architecture.as_bytes());
        hasher.update(b"\n");
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
