//! Metadata assembly.
//!
//! Dependency order is fixed: Debian packages, then git sources, then
//! archives, each kind in collection order. Duplicates are kept.

use deplab_core::build_info::BuildInfo;
use deplab_core::metadata::{
    ArchiveSource, BaseInfo, DebianPackageList, Dependency, GitSource, Metadata,
};

/// Everything the providers produced for one run.
#[derive(Debug, Clone, Default)]
pub struct ProviderOutputs {
    pub base: BaseInfo,
    pub debian: Option<DebianPackageList>,
    /// In collection order
    pub git: Vec<GitSource>,
    /// In collection order
    pub archives: Vec<ArchiveSource>,
}

/// Merge provider outputs into the metadata document.
pub fn assemble(outputs: ProviderOutputs, build: &BuildInfo) -> Metadata {
    let debian = outputs
        .debian
        .filter(|list| !list.packages.is_empty())
        .map(Dependency::DebianPackages);

    let dependencies: Vec<Dependency> = debian
        .into_iter()
        .chain(outputs.git.into_iter().map(Dependency::Git))
        .chain(outputs.archives.into_iter().map(Dependency::Archive))
        .collect();

    tracing::debug!(dependencies = dependencies.len(), "Assembled metadata");

    Metadata {
        base: outputs.base,
        provenance: vec![build.provenance()],
        dependencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deplab_core::metadata::{Checksum, DebianPackage};

    fn git(url: &str) -> GitSource {
        GitSource {
            url: url.to_string(),
            commit: Some("abc".to_string()),
            refs: vec![],
        }
    }

    fn archive(url: &str) -> ArchiveSource {
        ArchiveSource {
            url: url.to_string(),
            checksum: Checksum::sha256("00"),
        }
    }

    fn packages(n: usize) -> DebianPackageList {
        DebianPackageList::new(
            (0..n)
                .map(|i| DebianPackage {
                    name: format!("pkg{}", i),
                    version: "1.0".to_string(),
                    architecture: "amd64".to_string(),
                })
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_assemble_order() {
        let outputs = ProviderOutputs {
            base: BaseInfo::unknown(),
            debian: Some(packages(2)),
            git: vec![git("https://a/one"), git("https://a/two")],
            archives: vec![archive("https://b/x.tgz")],
        };
        let metadata = assemble(outputs, &BuildInfo::with_version("1.2.3"));

        let kinds: Vec<_> = metadata.dependencies.iter().map(|d| d.kind()).collect();
        assert_eq!(kinds, vec!["debian_packages", "git", "git", "archive"]);
        match &metadata.dependencies[2] {
            Dependency::Git(source) => assert_eq!(source.url, "https://a/two"),
            other => panic!("unexpected dependency {:?}", other),
        }
        assert_eq!(metadata.provenance.len(), 1);
        assert_eq!(metadata.provenance[0].version, "1.2.3");
    }

    #[test]
    fn test_assemble_omits_empty_debian() {
        for debian in [None, Some(packages(0))] {
            let metadata = assemble(
                ProviderOutputs {
                    debian,
                    archives: vec![archive("https://b/x.tgz")],
                    ..Default::default()
                },
                &BuildInfo::current(),
            );
            assert!(metadata.debian_packages().is_none());
            assert_eq!(metadata.dependencies.len(), 1);
        }
    }

    #[test]
    fn test_assemble_keeps_duplicates() {
        let metadata = assemble(
            ProviderOutputs {
                git: vec![git("https://a/one"), git("https://a/one")],
                ..Default::default()
            },
            &BuildInfo::current(),
        );
        assert_eq!(metadata.dependencies.len(), 2);
    }
}
