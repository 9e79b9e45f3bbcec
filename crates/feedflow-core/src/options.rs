//! Installer configuration.
//!
//! Loaded from TOML, for example:
//!
//! ```toml
//! package_directory = "plugins"
//! platform = "net8.0"
//!
//! [[sources]]
//! source = "https://feed.example.com/v1"
//! username = "ci"
//! password = "secret"
//!
//! [[sources]]
//! source = "./local-feed"
//!
//! [[packages]]
//! name = "Acme.Plugins"
//! version = ">=1.0.0, <2.0.0"
//!
//! [host]
//! provided = ["Acme.Runtime"]
//! libraries = [{ name = "Acme.Logging", version = "2.1.0" }]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use feedflow_schema::PackageRequirement;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Everything one reconciliation run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerOptions {
    /// Feeds, in priority order.
    pub sources: Vec<FeedOptions>,
    /// Directory the resolved packages are installed into.
    pub package_directory: PathBuf,
    /// Top-level package requests.
    pub packages: Vec<PackageRequirement>,
    /// Target platform used to select dependency groups and content folders.
    pub platform: String,
    /// Packages the host application already supplies.
    pub host: HostOptions,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            package_directory: PathBuf::from(".packages"),
            packages: Vec::new(),
            platform: "any".to_string(),
            host: HostOptions::default(),
        }
    }
}

impl InstallerOptions {
    pub fn from_toml_str(raw: &str) -> Result<Self, FlowError> {
        toml::from_str(raw).map_err(|e| FlowError::InvalidInput(format!("invalid configuration: {e}")))
    }

    /// Read and parse a TOML configuration file.
    pub async fn load(path: &Path) -> Result<Self, FlowError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            FlowError::InvalidInput(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply `FEEDFLOW_PACKAGE_DIRECTORY` and `FEEDFLOW_PLATFORM` if set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("FEEDFLOW_PACKAGE_DIRECTORY").ok(),
            std::env::var("FEEDFLOW_PLATFORM").ok(),
        )
    }

    fn with_overrides(mut self, package_directory: Option<String>, platform: Option<String>) -> Self {
        if let Some(dir) = package_directory.filter(|d| !d.trim().is_empty()) {
            self.package_directory = PathBuf::from(dir);
        }
        if let Some(platform) = platform.filter(|p| !p.trim().is_empty()) {
            self.platform = platform;
        }
        self
    }

    /// Make `package_directory` absolute relative to `base_path`.
    pub fn resolve_paths(mut self, base_path: &Path) -> Self {
        if self.package_directory.is_relative() {
            self.package_directory = base_path.join(&self.package_directory);
        }
        self
    }
}

/// One configured feed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOptions {
    /// URL or directory path; relative paths resolve against the config file.
    pub source: String,
    /// Basic-auth user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl FeedOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for FeedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedOptions")
            .field("source", &self.source)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Packages supplied by the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostOptions {
    /// Names provided unconditionally.
    pub provided: Vec<String>,
    /// Libraries the host ships, with the version it ships.
    pub libraries: Vec<HostLibrary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLibrary {
    pub name: String,
    pub version: String,
}
