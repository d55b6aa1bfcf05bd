//! Image tag parsing.
//!
//! Validates the `--tag` value an annotated image is published under:
//!
//! - `app` → `app:latest`
//! - `app:1.0` → `app:1.0`
//! - `ghcr.io/org/app:1.0` → `ghcr.io/org/app:1.0`
//! - `localhost:5000/app` → `localhost:5000/app:latest`
//!
//! Empty suffixes (`app:`), several separators (`app:1:2`) and anything that
//! is not a valid repository name (`app:1/x`) are rejected.

use deplab_core::error::{DeplabError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

static PATH_COMPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").unwrap());

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]{0,127}$").unwrap());

static HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$")
        .unwrap()
});

/// Validated `name:tag` reference for an annotated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    /// Repository, including registry host if given (e.g., "ghcr.io/org/app")
    pub repository: String,
    /// Tag (e.g., "latest", "v0.1.0")
    pub tag: String,
}

impl ImageTag {
    /// Parse a user-supplied tag. Empty input means "no tag".
    pub fn parse(input: &str) -> Result<Option<Self>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let invalid = |reason: &str| DeplabError::InvalidTag {
            tag: input.to_string(),
            reason: reason.to_string(),
        };

        if input.contains('@') {
            return Err(invalid("digests are not allowed in a tag"));
        }

        // Tag separator is a colon after the last slash
        let last_segment_start = input.rfind('/').map(|pos| pos + 1).unwrap_or(0);
        let last_segment = &input[last_segment_start..];
        let (repository, tag) = match last_segment.matches(':').count() {
            0 => (input, DEFAULT_TAG),
            1 => {
                let colon = last_segment_start + last_segment.find(':').unwrap_or(0);
                (&input[..colon], &input[colon + 1..])
            }
            _ => return Err(invalid("more than one tag separator")),
        };

        if tag.is_empty() {
            return Err(invalid("empty tag after ':'"));
        }
        if !TAG.is_match(tag) {
            return Err(invalid("tag must match [A-Za-z0-9_][A-Za-z0-9_.-]{0,127}"));
        }
        Self::validate_repository(repository).map_err(|reason| invalid(&reason))?;

        Ok(Some(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        }))
    }

    fn validate_repository(repository: &str) -> std::result::Result<(), String> {
        if repository.is_empty() {
            return Err("empty repository name".to_string());
        }

        let components: Vec<&str> = repository.split('/').collect();
        let path = match components.split_first() {
            Some((first, rest))
                if !rest.is_empty()
                    && (first.contains('.') || first.contains(':') || *first == "localhost") =>
            {
                Self::validate_registry(first)?;
                rest
            }
            _ => &components[..],
        };

        for component in path {
            if !PATH_COMPONENT.is_match(component) {
                return Err(format!(
                    "repository component '{}' must be lowercase alphanumerics separated by '.', '_' or '-'",
                    component
                ));
            }
        }
        Ok(())
    }

    fn validate_registry(registry: &str) -> std::result::Result<(), String> {
        let (host, port) = match registry.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (registry, None),
        };
        if !HOST.is_match(host) {
            return Err(format!("registry host '{}' is not a valid hostname", host));
        }
        if let Some(port) = port {
            if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("registry port '{}' must be numeric", port));
            }
        }
        Ok(())
    }

    /// Full `repository:tag` reference.
    pub fn full_reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl std::fmt::Display for ImageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(input: &str) -> String {
        ImageTag::parse(input).unwrap().unwrap().full_reference()
    }

    #[test]
    fn test_tag_with_suffix() {
        assert_eq!(parsed("foo:bar"), "foo:bar");
    }

    #[test]
    fn test_tag_without_suffix_gets_latest() {
        assert_eq!(parsed("foo"), "foo:latest");
    }

    #[test]
    fn test_empty_tag_means_untagged() {
        assert_eq!(ImageTag::parse("").unwrap(), None);
        assert_eq!(ImageTag::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_empty_suffix_is_invalid() {
        let err = ImageTag::parse("foo:").unwrap_err().to_string();
        assert!(err.contains("foo:"));
        assert!(err.contains("invalid"));
    }

    #[test]
    fn test_separator_before_slash_is_invalid() {
        for input in ["foo:bar/baz", "foo:testtag/bar"] {
            let err = ImageTag::parse(input).unwrap_err().to_string();
            assert!(err.contains(input), "{err}");
            assert!(err.contains("is invalid"), "{err}");
        }
    }

    #[test]
    fn test_multiple_separators_are_invalid() {
        let err = ImageTag::parse("foo:bar:baz").unwrap_err().to_string();
        assert!(err.contains("foo:bar:baz"));
        assert!(err.contains("invalid"));
    }

    #[test]
    fn test_registry_with_port() {
        assert_eq!(parsed("localhost:5000/app"), "localhost:5000/app:latest");
        assert_eq!(
            parsed("myregistry.io:5000/team/app:v1"),
            "myregistry.io:5000/team/app:v1"
        );
    }

    #[test]
    fn test_custom_registry() {
        let tag = ImageTag::parse("ghcr.io/org/sub/app:v0.1.0").unwrap().unwrap();
        assert_eq!(tag.repository, "ghcr.io/org/sub/app");
        assert_eq!(tag.tag, "v0.1.0");
        assert_eq!(format!("{}", tag), "ghcr.io/org/sub/app:v0.1.0");
    }

    #[test]
    fn test_uppercase_repository_is_invalid() {
        assert!(ImageTag::parse("MyApp:1").is_err());
    }

    #[test]
    fn test_digest_is_invalid() {
        assert!(ImageTag::parse("app@sha256:abc").is_err());
    }

    #[test]
    fn test_tag_charset() {
        assert_eq!(parsed("app:v1.2.3-rc_1"), "app:v1.2.3-rc_1");
        assert!(ImageTag::parse("app:.hidden").is_err());
        assert!(ImageTag::parse(&format!("app:{}", "a".repeat(129))).is_err());
    }
}
