//! Dependency providers.
//!
//! Each provider turns one kind of input into metadata:
//!
//! - [`debian`]: installed dpkg packages of the image
//! - [`base`]: the image's OS release
//! - [`git`]: one working tree or remote locator
//! - [`archive`]: one fetched archive, content-addressed

pub mod archive;
pub mod base;
pub mod debian;
pub mod git;

pub use archive::{archive_dependency, http_client};
pub use base::base_metadata;
pub use debian::debian_packages;
pub use git::git_dependency;
