//! Domain-specific errors for resolution and installation runs

use std::future::Future;

use feedflow_schema::VersionError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::feed::FeedError;
use crate::io::extract::ExtractError;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Malformed configuration or version-range expression.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No feed has any matching version of a requested package.
    #[error("Cannot find package {0}")]
    NotFound(String),

    /// No version assignment satisfies every dependency edge.
    #[error("Failed to resolve a consistent package set:\n{0}")]
    Conflict(String),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to extract {package}: {source}")]
    Extract {
        package: String,
        #[source]
        source: ExtractError,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Completion callback failed: {0}")]
    Callback(#[source] anyhow::Error),
}

impl From<VersionError> for FlowError {
    fn from(err: VersionError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Race `fut` against `cancel`, mapping its error into [`FlowError`].
pub(crate) async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, FlowError>
where
    F: Future<Output = Result<T, E>>,
    FlowError: From<E>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FlowError::Cancelled),
        res = fut => res.map_err(FlowError::from),
    }
}
