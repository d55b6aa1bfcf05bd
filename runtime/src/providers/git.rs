//! Git provider.
//!
//! Working trees are inspected with the `git` binary; locators read from an
//! additional-sources file are recorded as given.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::GitSource;
use tokio::process::Command;

use crate::sources::GitDescriptor;

/// Remote preferred when a working tree has several.
const PREFERRED_REMOTE: &str = "origin";

/// Build the `git` dependency for one descriptor.
pub async fn git_dependency(descriptor: &GitDescriptor, timeout: Duration) -> Result<GitSource> {
    match descriptor {
        GitDescriptor::Locator(locator) => Ok(GitSource {
            url: locator.url.clone(),
            commit: locator.reference.clone(),
            refs: Vec::new(),
        }),
        GitDescriptor::WorkingTree(path) => working_tree_dependency(path, timeout).await,
    }
}

async fn working_tree_dependency(path: &Path, timeout: Duration) -> Result<GitSource> {
    if !path.is_dir() {
        return Err(git_error(path, "not a directory".to_string()));
    }

    let commit = run_git(path, &["rev-parse", "HEAD"], timeout).await?;

    let remotes = run_git(path, &["remote"], timeout).await?;
    let remotes: Vec<&str> = remotes.lines().map(str::trim).filter(|r| !r.is_empty()).collect();
    let remote = remotes
        .iter()
        .copied()
        .find(|r| *r == PREFERRED_REMOTE)
        .or_else(|| remotes.first().copied())
        .ok_or_else(|| git_error(path, "no remotes configured".to_string()))?;
    let url = run_git(path, &["remote", "get-url", remote], timeout).await?;

    let tags = run_git(path, &["tag", "--points-at", "HEAD"], timeout).await?;
    let refs = tags
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(
        path = %path.display(),
        remote = %remote,
        commit = %commit,
        "Read git working tree"
    );

    Ok(GitSource {
        url,
        commit: Some(commit),
        refs,
    })
}

/// Run `git -C <path> <args>` and return trimmed stdout.
async fn run_git(path: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(path)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, output)
        .await
        .map_err(|_| {
            git_error(
                path,
                format!("`git {}` timed out after {}s", args.join(" "), timeout.as_secs()),
            )
        })?
        .map_err(|e| git_error(path, format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(git_error(
            path,
            format!(
                "`git {}` failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn git_error(path: &Path, message: String) -> DeplabError {
    DeplabError::GitMetadata {
        path: path.display().to_string(),
        message,
    }
}
