//! Core library for feedflow.
//!
//! Resolves package requirements against an ordered list of feeds,
//! installs the resulting set into a target directory, and reconciles that
//! directory whenever the configuration changes.
//!
//! ```text
//! requirements --resolver--> identities --closure--> DependencyClosure
//!     --pubgrub_adapter--> InstallSet --install--> InstallReport
//! ```
//!
//! [`reconcile::Reconciler`] wraps the pipeline behind a configuration
//! fingerprint, and [`queue::WorkQueue`] serializes reconciliation runs so
//! that only one task ever writes to a target directory.

pub mod closure;
pub mod error;
pub mod feed;
pub mod fingerprint;
pub mod host;
pub mod install;
pub mod installer;
pub mod io;
pub mod layout;
pub mod options;
pub mod paths;
pub mod pubgrub_adapter;
pub mod queue;
pub mod reconcile;
pub mod reporter;
pub mod resolver;
pub mod service;

#[cfg(test)]
mod test_support;

pub use error::FlowError;
pub use installer::PackageInstaller;
pub use options::{FeedOptions, HostLibrary, HostOptions, InstallerOptions};
pub use paths::*;
pub use reporter::{NullReporter, Reporter, TracingReporter};

pub use feedflow_schema as schema;

/// User Agent string for feed requests
pub const USER_AGENT: &str = concat!("feedflow-core/", env!("CARGO_PKG_VERSION"));
