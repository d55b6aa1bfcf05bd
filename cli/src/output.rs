//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};
use deplab_core::metadata::{Dependency, Metadata};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// One `[type, source, version]` row per dependency record.
///
/// Debian package lists expand to one row per package.
pub fn dependency_rows(metadata: &Metadata) -> Vec<[String; 3]> {
    let mut rows = Vec::new();
    for dependency in &metadata.dependencies {
        match dependency {
            Dependency::DebianPackages(list) => {
                for package in &list.packages {
                    rows.push([
                        "deb".to_string(),
                        format!("{}:{}", package.name, package.architecture),
                        package.version.clone(),
                    ]);
                }
            }
            Dependency::Git(source) => {
                let version = match (&source.commit, source.refs.first()) {
                    (Some(commit), Some(tag)) => format!("{} ({})", short_hash(commit), tag),
                    (Some(commit), None) => short_hash(commit).to_string(),
                    (None, Some(tag)) => tag.clone(),
                    (None, None) => "-".to_string(),
                };
                rows.push([dependency.kind().to_string(), source.url.clone(), version]);
            }
            Dependency::Archive(archive) => {
                rows.push([
                    dependency.kind().to_string(),
                    archive.url.clone(),
                    format!(
                        "{}:{}",
                        archive.checksum.algorithm,
                        short_hash(&archive.checksum.value)
                    ),
                ]);
            }
        }
    }
    rows
}

/// First 12 characters of a hex digest.
fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deplab_core::metadata::{
        ArchiveSource, BaseInfo, Checksum, DebianPackage, DebianPackageList, GitSource,
    };

    #[test]
    fn test_dependency_rows() {
        let metadata = Metadata {
            base: BaseInfo::unknown(),
            provenance: vec![],
            dependencies: vec![
                Dependency::DebianPackages(DebianPackageList::new(
                    vec![DebianPackage {
                        name: "libc6".to_string(),
                        version: "2.31-13".to_string(),
                        architecture: "amd64".to_string(),
                    }],
                    vec![],
                )),
                Dependency::Git(GitSource {
                    url: "https://example.com/app.git".to_string(),
                    commit: Some("0123456789abcdef0123".to_string()),
                    refs: vec!["v1.0.0".to_string()],
                }),
                Dependency::Archive(ArchiveSource {
                    url: "https://example.com/a.tgz".to_string(),
                    checksum: Checksum::sha256("ffffffffffffffffffff"),
                }),
            ],
        };

        let rows = dependency_rows(&metadata);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ["deb", "libc6:amd64", "2.31-13"].map(String::from));
        assert_eq!(rows[1][2], "0123456789ab (v1.0.0)");
        assert_eq!(rows[2][2], "sha256:ffffffffffff");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
    }

    #[test]
    fn test_new_table() {
        let mut table = new_table(&["A", "B"]);
        table.add_row(vec!["1", "2"]);
        let rendered = table.to_string();
        assert!(rendered.contains('A'));
        assert!(rendered.contains('2'));
    }
}
