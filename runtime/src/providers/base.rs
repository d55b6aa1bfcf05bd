//! Base OS provider.

use std::collections::HashMap;

use deplab_core::metadata::{BaseInfo, UNKNOWN};

use crate::oci::ImageFilesystem;

const OS_RELEASE_PATHS: [&str; 2] = ["etc/os-release", "usr/lib/os-release"];

/// Identify the image's distribution from its os-release file.
///
/// Never fails: missing or unreadable files yield [`BaseInfo::unknown`].
pub fn base_metadata(fs: &dyn ImageFilesystem) -> BaseInfo {
    for path in OS_RELEASE_PATHS {
        match fs.read_file(path) {
            Ok(Some(content)) => {
                let fields = parse_os_release(&String::from_utf8_lossy(&content));
                let field = |key: &str| {
                    fields
                        .get(key)
                        .filter(|v| !v.is_empty())
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN.to_string())
                };
                let base = BaseInfo {
                    name: field("NAME"),
                    version_id: field("VERSION_ID"),
                    version_codename: field("VERSION_CODENAME"),
                };
                tracing::debug!(path, name = %base.name, "Identified base image");
                return base;
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(path, error = %e, "Could not read os-release");
                continue;
            }
        }
    }
    BaseInfo::unknown()
}

/// Parse `KEY=VALUE` lines, removing shell quoting.
fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
        .collect()
}

fn unquote(value: &str) -> String {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if !quoted {
        return value.to_string();
    }

    let inner = &value[1..value.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
