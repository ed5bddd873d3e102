use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler and its runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata error: {0}")]
    Metadata(#[from] topogen_core::MetadataError),

    #[error("sync error: {0}")]
    Sync(#[from] topogen_sync::SyncError),

    /// One-shot run finished but some templates failed.
    #[error("{count} template(s) failed")]
    TemplatesFailed { count: usize },

    #[error("task error: {0}")]
    Task(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
