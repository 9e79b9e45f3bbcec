//! Reporter trait for dependency injection
//!
//! Lets the install pipeline report progress without being coupled to a
//! particular front end. The CLI logs through [`TracingReporter`]; embedders
//! and tests usually pass [`NullReporter`].

use feedflow_schema::PackageIdentity;

pub trait Reporter: Send + Sync {
    /// A new phase of a run has started (e.g. "Resolving", "Installing").
    fn section(&self, title: &str);

    /// A requested package was resolved to a concrete identity.
    fn resolved(&self, identity: &PackageIdentity);

    /// Bytes received so far for a package archive.
    fn downloading(&self, identity: &PackageIdentity, current: u64);

    /// Extraction of a package archive has begun.
    fn extracting(&self, identity: &PackageIdentity);

    /// A package was left untouched.
    fn skipped(&self, identity: &PackageIdentity, reason: &str);

    /// A package was installed; `files` is the number of files written.
    fn done(&self, identity: &PackageIdentity, files: usize);

    /// A package operation failed.
    fn failed(&self, identity: &PackageIdentity, reason: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn resolved(&self, identity: &PackageIdentity) {
        (**self).resolved(identity);
    }
    fn downloading(&self, identity: &PackageIdentity, current: u64) {
        (**self).downloading(identity, current);
    }
    fn extracting(&self, identity: &PackageIdentity) {
        (**self).extracting(identity);
    }
    fn skipped(&self, identity: &PackageIdentity, reason: &str) {
        (**self).skipped(identity, reason);
    }
    fn done(&self, identity: &PackageIdentity, files: usize) {
        (**self).done(identity, files);
    }
    fn failed(&self, identity: &PackageIdentity, reason: &str) {
        (**self).failed(identity, reason);
    }
}

/// A no-op reporter for silent operations (e.g., planning, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn resolved(&self, _: &PackageIdentity) {}
    fn downloading(&self, _: &PackageIdentity, _: u64) {}
    fn extracting(&self, _: &PackageIdentity) {}
    fn skipped(&self, _: &PackageIdentity, _: &str) {}
    fn done(&self, _: &PackageIdentity, _: usize) {}
    fn failed(&self, _: &PackageIdentity, _: &str) {}
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn section(&self, title: &str) {
        tracing::info!("{title}");
    }

    fn resolved(&self, identity: &PackageIdentity) {
        tracing::info!("Resolved {identity}");
    }

    fn downloading(&self, identity: &PackageIdentity, current: u64) {
        tracing::trace!(package = %identity, bytes = current, "downloading");
    }

    fn extracting(&self, identity: &PackageIdentity) {
        tracing::debug!("Extracting {identity}");
    }

    fn skipped(&self, identity: &PackageIdentity, reason: &str) {
        tracing::info!("Skipping {identity}: {reason}");
    }

    fn done(&self, identity: &PackageIdentity, files: usize) {
        tracing::info!("Installed {identity} ({files} files)");
    }

    fn failed(&self, identity: &PackageIdentity, reason: &str) {
        tracing::error!("Failed to install {identity}: {reason}");
    }
}
