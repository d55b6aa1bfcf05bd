//! Version-control locator validation.
//!
//! Accepts URIs with a `git`, `ssh`, `http` or `https` scheme and SCP-style
//! `user@host:path` locators.

use once_cell::sync::Lazy;
use regex::Regex;

const GIT_LOCATOR_PATTERN: &str =
    r"^(?:(?:git|ssh|https?)|(?:[\w.\-]+@[\w.\-]+)):[\w.@:/\-~]+/?$";

static GIT_LOCATOR: Lazy<Option<Regex>> = Lazy::new(|| match Regex::new(GIT_LOCATOR_PATTERN) {
    Ok(re) => Some(re),
    Err(e) => {
        tracing::warn!(error = %e, "Failed to compile git locator pattern");
        None
    }
});

/// Whether `locator` looks like something `git clone` accepts as a remote.
///
/// Never fails: a matcher failure is logged and reported as "not valid".
pub fn is_valid_git_reference(locator: &str) -> bool {
    match GIT_LOCATOR.as_ref() {
        Some(re) => re.is_match(locator),
        None => false,
    }
}
