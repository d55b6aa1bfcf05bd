//! Archive provider.
//!
//! Fetches each archive and digests the bytes actually received. Nothing is
//! cached and failed fetches are not retried.

use std::time::Duration;

use deplab_core::error::{DeplabError, Result};
use deplab_core::metadata::{ArchiveSource, Checksum};
use sha2::{Digest, Sha256};

use crate::sources::ArchiveLocator;

/// HTTP client shared by all archive fetches of a run.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("deplab/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DeplabError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Fetch one archive and build its `archive` dependency.
pub async fn archive_dependency(
    client: &reqwest::Client,
    locator: &ArchiveLocator,
) -> Result<ArchiveSource> {
    let archive_error = |message: String| DeplabError::ArchiveMetadata {
        url: locator.url.clone(),
        message,
    };

    let mut response = client
        .get(&locator.url)
        .send()
        .await
        .map_err(|e| archive_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(archive_error(format!("HTTP {}", response.status())));
    }

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| archive_error(e.to_string()))?
    {
        size += chunk.len() as u64;
        hasher.update(&chunk);
    }
    let value = hex::encode(hasher.finalize());

    tracing::debug!(url = %locator.url, size, sha256 = %value, "Fetched archive");

    Ok(ArchiveSource {
        url: locator.url.clone(),
        checksum: Checksum::sha256(value),
    })
}
