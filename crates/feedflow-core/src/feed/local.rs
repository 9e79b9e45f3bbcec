//! Directory-backed feed.
//!
//! Versions are discovered by listing `<root>/<name>/`, so no `index.json`
//! is needed on disk.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use feedflow_schema::{PackageIdentity, PackageManifest, PackageName, Version};
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;

use super::{FeedClient, FeedError, PackageMetadata, PackageStream, parse_versions};

#[derive(Debug, Clone)]
pub struct LocalFeed {
    root: PathBuf,
    source: String,
}

impl LocalFeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let source = root.display().to_string();
        Self { root, source }
    }

    /// Locate the directory for `identity`, accepting non-normalized names
    /// such as `1.0` for `1.0.0`.
    async fn version_dir(&self, identity: &PackageIdentity) -> Result<Option<PathBuf>, FeedError> {
        let package_dir = self.root.join(identity.name.key());
        let normalized = package_dir.join(identity.version.normalized());
        if tokio::fs::try_exists(&normalized).await? {
            return Ok(Some(normalized));
        }

        let mut entries = match tokio::fs::read_dir(&package_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let matches = name
                .to_str()
                .and_then(|s| Version::parse(s).ok())
                .is_some_and(|v| v == identity.version);
            if matches {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl FeedClient for LocalFeed {
    fn source(&self) -> &str {
        &self.source
    }

    async fn list_versions(&self, name: &PackageName) -> Result<Vec<Version>, FeedError> {
        let dir = self.root.join(name.key());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(s) = entry.file_name().to_str() {
                    names.push(s.to_string());
                }
            }
        }
        Ok(parse_versions(&self.source, names.iter().map(String::as_str)))
    }

    async fn metadata(
        &self,
        identity: &PackageIdentity,
        platform: &str,
    ) -> Result<Option<PackageMetadata>, FeedError> {
        let Some(dir) = self.version_dir(identity).await? else {
            return Ok(None);
        };
        let path = dir.join("package.json");
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let manifest: PackageManifest =
            serde_json::from_slice(&raw).map_err(|source| FeedError::Manifest {
                location: path.display().to_string(),
                source,
            })?;
        let dependencies =
            manifest
                .dependencies_for(platform)
                .map_err(|source| FeedError::Metadata {
                    package: identity.to_string(),
                    source,
                })?;

        Ok(Some(PackageMetadata {
            dependencies,
            listed: manifest.listed,
        }))
    }

    async fn download(&self, identity: &PackageIdentity) -> Result<PackageStream, FeedError> {
        let dir = self
            .version_dir(identity)
            .await?
            .ok_or_else(|| FeedError::MissingContent(identity.to_string()))?;
        let file = match tokio::fs::File::open(dir.join(identity.archive_name())).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FeedError::MissingContent(identity.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Box::pin(ReaderStream::new(file).map_err(FeedError::Io)))
    }
}
