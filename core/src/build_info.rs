//! Build identity of the running tool.

use crate::metadata::Provenance;

/// Version reported when the binary was built without `DEPLAB_VERSION`.
pub const UNKNOWN_VERSION: &str = "0.0.0-dev";

/// Version string baked in at compile time.
pub const VERSION: &str = match option_env!("DEPLAB_VERSION") {
    Some(v) if !v.is_empty() => v,
    _ => UNKNOWN_VERSION,
};

/// Tool name recorded in provenance.
pub const TOOL_NAME: &str = "deplab";

/// Tool homepage recorded in provenance.
pub const TOOL_URL: &str = "https://github.com/vmware-tanzu/dependency-labeler";

/// Identity of this build, constructed once and handed to the components
/// that stamp it into their output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
    pub url: String,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self::with_version(VERSION)
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            name: TOOL_NAME.to_string(),
            version: version.into(),
            url: TOOL_URL.to_string(),
        }
    }

    /// Self-describing provenance entry.
    pub fn provenance(&self) -> Provenance {
        Provenance {
            name: self.name.clone(),
            version: self.version.clone(),
            url: self.url.clone(),
        }
    }
}
