//! Error types for topogen-sync.

use std::path::PathBuf;

use thiserror::Error;

use topogen_core::{ConfigError, MetadataError};
use topogen_renderer::RenderError;

/// All errors that can arise while processing one template.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Rendering failed. Fatal: see [`SyncError::is_fatal`].
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Rebuilding the snapshot for a label group failed.
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Invalid template settings (label selector).
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Digest comparison against the destination failed.
    #[error("could not compare content for {path}: {source}")]
    Compare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Template render failures end the run; everything else is per-template.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Render(_))
    }
}

/// Failure of a single check or notify command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The shell could not be started.
    #[error("could not launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("'{command}' exited with {}", exit_description(.status))]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },
}

fn exit_description(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
