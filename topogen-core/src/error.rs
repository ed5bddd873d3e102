//! Error types for topogen-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating the process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A semantically invalid setting.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A label selector that is not `name` or `name:value`.
    #[error("invalid label selector '{0}': expected 'name' or 'name:value'")]
    InvalidSelector(String),
}

/// Errors raised by a metadata source.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The HTTP request itself failed (connection refused, non-2xx status, ...).
    #[error("metadata request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The response body could not be read or decoded.
    #[error("could not decode metadata response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a metadata document from disk failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A metadata document on disk is malformed.
    #[error("failed to parse metadata document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The metadata service never answered during startup.
    #[error("metadata service at {url} not reachable after {attempts} attempts")]
    Unreachable { url: String, attempts: u32 },
}

pub(crate) fn config_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn metadata_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MetadataError {
    MetadataError::Io {
        path: path.into(),
        source,
    }
}
