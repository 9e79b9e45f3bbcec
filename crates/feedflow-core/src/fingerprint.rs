//! Configuration fingerprints.
//!
//! A successful run stores a digest of the options it used in the target
//! directory. The next run with identical options sees a matching digest
//! and does no work.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::FlowError;
use crate::options::InstallerOptions;
use crate::paths::FINGERPRINT_FILE;

/// SHA-256 of the canonical JSON form of an [`InstallerOptions`].
#[derive(Clone, PartialEq, Eq)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn compute(options: &InstallerOptions) -> Result<Self, FlowError> {
        let json = serde_json::to_vec(options)
            .map_err(|e| FlowError::InvalidInput(format!("options are not serializable: {e}")))?;
        Ok(Self(Sha256::digest(&json).to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Compare against a stored digest. An empty store never matches.
    pub fn matches(&self, stored: &[u8]) -> bool {
        !stored.is_empty() && self.0 == stored
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(&self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Persistence for the last successful fingerprint of a target directory.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// The stored digest, or an empty vector if nothing is stored.
    async fn load(&self, target: &Path) -> Result<Vec<u8>, FlowError>;

    async fn save(&self, target: &Path, fingerprint: &Fingerprint) -> Result<(), FlowError>;
}

/// Stores the raw digest bytes in `<target>/.feedflow.sha256`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFingerprintStore;

#[async_trait]
impl FingerprintStore for FileFingerprintStore {
    async fn load(&self, target: &Path) -> Result<Vec<u8>, FlowError> {
        match tokio::fs::read(target.join(FINGERPRINT_FILE)).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, target: &Path, fingerprint: &Fingerprint) -> Result<(), FlowError> {
        tokio::fs::create_dir_all(target).await?;
        let path = target.join(FINGERPRINT_FILE);
        let tmp = target.join(format!("{FINGERPRINT_FILE}.tmp"));
        tokio::fs::write(&tmp, fingerprint.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FeedOptions;
    use feedflow_schema::PackageRequirement;
    use tempfile::tempdir;

    fn sample() -> InstallerOptions {
        InstallerOptions {
            sources: vec![FeedOptions::new("https://feed.example.com")],
            packages: vec![PackageRequirement::new("lib-a").with_version("1.0.0")],
            ..InstallerOptions::default()
        }
    }

    #[test]
    fn test_identical_options_identical_fingerprint() {
        assert_eq!(
            Fingerprint::compute(&sample()).unwrap(),
            Fingerprint::compute(&sample()).unwrap()
        );
    }

    #[test]
    fn test_any_field_change_alters_fingerprint() {
        let base = Fingerprint::compute(&sample()).unwrap();

        let mut changed = sample();
        changed.platform = "net8.0".into();
        assert_ne!(Fingerprint::compute(&changed).unwrap(), base);

        let mut changed = sample();
        changed.packages[0].prerelease = true;
        assert_ne!(Fingerprint::compute(&changed).unwrap(), base);

        let mut changed = sample();
        changed.sources[0].password = Some("pw".into());
        assert_ne!(Fingerprint::compute(&changed).unwrap(), base);

        let mut changed = sample();
        changed.packages[0].version = Some("[1.0.0,2.0.0)".into());
        assert_ne!(Fingerprint::compute(&changed).unwrap(), base);

        let mut changed = sample();
        changed.host.provided.push("runtime".into());
        assert_ne!(Fingerprint::compute(&changed).unwrap(), base);
    }

    #[test]
    fn test_empty_store_never_matches() {
        let fp = Fingerprint::compute(&sample()).unwrap();
        assert!(!fp.matches(&[]));
        assert!(fp.matches(fp.as_bytes()));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("not-yet-created");
        let store = FileFingerprintStore;

        assert!(store.load(&target).await.unwrap().is_empty());

        let fp = Fingerprint::compute(&sample()).unwrap();
        store.save(&target, &fp).await.unwrap();
        assert!(fp.matches(&store.load(&target).await.unwrap()));

        let on_disk = std::fs::read(target.join(FINGERPRINT_FILE)).unwrap();
        assert_eq!(on_disk, fp.as_bytes());
        assert_eq!(on_disk.len(), 32);
    }

    #[tokio::test]
    async fn test_garbled_file_does_not_match() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(FINGERPRINT_FILE), b"garbage").unwrap();

        let fp = Fingerprint::compute(&sample()).unwrap();
        let stored = FileFingerprintStore.load(dir.path()).await.unwrap();
        assert!(!fp.matches(&stored));
    }
}
