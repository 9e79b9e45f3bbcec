//! Download cache.
//!
//! Archives are cached per identity under
//! `<cache>/<name>/<version>/<name>.<version>.zip`, next to a `.sha256`
//! sidecar holding the digest computed while streaming. A cached archive is
//! reused only when its sidecar still matches. Writes go to a temp file in
//! the same directory and are renamed into place.

use std::path::{Path, PathBuf};

use feedflow_schema::PackageIdentity;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::Reporter;
use crate::error::{FlowError, cancellable};
use crate::feed::FeedClient;

/// Where `identity` lives in the cache.
///
/// Fails for names that are not a single safe path component.
pub fn cache_entry(cache_root: &Path, identity: &PackageIdentity) -> Result<PathBuf, FlowError> {
    if !identity.name.is_path_safe() {
        return Err(FlowError::InvalidInput(format!(
            "package name '{}' cannot be cached",
            identity.name
        )));
    }
    Ok(cache_root
        .join(identity.name.key())
        .join(identity.version.normalized())
        .join(identity.archive_name()))
}

fn sidecar(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Returns `true` if `archive` exists and matches its recorded digest.
async fn is_cached(archive: &Path) -> Result<bool, FlowError> {
    let expected = match tokio::fs::read_to_string(sidecar(archive)).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let bytes = match tokio::fs::read(archive).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(hex::encode(Sha256::digest(&bytes)) == expected.trim())
}

/// Ensure `identity` is in the cache, downloading it from `feed` if needed.
///
/// Returns the path of the cached archive.
pub async fn fetch_to_cache(
    feed: &dyn FeedClient,
    identity: &PackageIdentity,
    cache_root: &Path,
    reporter: &dyn Reporter,
    cancel: &CancellationToken,
) -> Result<PathBuf, FlowError> {
    let archive = cache_entry(cache_root, identity)?;
    if is_cached(&archive).await? {
        tracing::debug!("Using cached archive {}", archive.display());
        return Ok(archive);
    }

    let dir = archive
        .parent()
        .ok_or_else(|| FlowError::InvalidInput(format!("bad cache path {}", archive.display())))?;
    tokio::fs::create_dir_all(dir).await?;

    let (std_file, temp_path) = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(dir)?
        .into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut stream = cancellable(cancel, feed.download(identity)).await?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    reporter.downloading(identity, 0);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FlowError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        reporter.downloading(identity, downloaded);
    }

    file.flush().await?;
    drop(file);

    let digest = hex::encode(hasher.finalize());
    temp_path.persist(&archive).map_err(|e| e.error)?;
    tokio::fs::write(sidecar(&archive), &digest).await?;
    tracing::debug!("Cached {identity} ({downloaded} bytes, sha256 {digest})");

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::feed::MemoryFeed;
    use crate::test_support::{id, publish};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_downloads_once_then_hits_cache() {
        let cache = tempdir().unwrap();
        let feed = MemoryFeed::new("feed");
        publish(&feed, "lib-a", "1.0.0", vec![]);
        let identity = id("lib-a", "1.0.0");
        let cancel = CancellationToken::new();

        let path = fetch_to_cache(&feed, &identity, cache.path(), &NullReporter, &cancel)
            .await
            .unwrap();
        assert!(path.ends_with("lib-a/1.0.0/lib-a.1.0.0.zip"));
        assert!(sidecar(&path).exists());
        let calls = feed.call_count();

        fetch_to_cache(&feed, &identity, cache.path(), &NullReporter, &cancel)
            .await
            .unwrap();
        assert_eq!(feed.call_count(), calls);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_refetched() {
        let cache = tempdir().unwrap();
        let feed = MemoryFeed::new("feed");
        publish(&feed, "lib-a", "1.0.0", vec![]);
        let identity = id("lib-a", "1.0.0");
        let cancel = CancellationToken::new();

        let path = fetch_to_cache(&feed, &identity, cache.path(), &NullReporter, &cancel)
            .await
            .unwrap();
        let original = std::fs::read(&path).unwrap();
        std::fs::write(&path, b"truncated").unwrap();

        fetch_to_cache(&feed, &identity, cache.path(), &NullReporter, &cancel)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_content_leaves_no_partial_file() {
        let cache = tempdir().unwrap();
        let feed = MemoryFeed::new("feed");
        let identity = id("lib-a", "1.0.0");

        let err = fetch_to_cache(
            &feed,
            &identity,
            cache.path(),
            &NullReporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FlowError::Feed(_)));

        let dir = cache.path().join("lib-a").join("1.0.0");
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unsafe_name_is_not_cached() {
        let root = tempdir().unwrap();
        let cache = root.path().join("cache");
        let feed = MemoryFeed::new("feed");
        publish(&feed, "../escaped", "1.0.0", vec![]);

        let err = fetch_to_cache(
            &feed,
            &id("../escaped", "1.0.0"),
            &cache,
            &NullReporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(_)));
        assert_eq!(feed.call_count(), 0);
        assert!(!root.path().join("escaped").exists());
    }
}
