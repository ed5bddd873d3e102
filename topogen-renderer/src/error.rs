//! Error types for topogen-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while rendering a template.
///
/// Every variant is fatal for the template that raised it: the caller decides
/// whether that ends the process.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The configured template source does not exist.
    #[error("template '{}' is missing", path.display())]
    Missing { path: PathBuf },

    /// Filesystem error while reading the template source.
    #[error("could not read template '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tera failed to parse the template.
    #[error("could not parse template '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: tera::Error,
    },

    /// Tera failed while executing the template (bad function call, ...).
    #[error("could not render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}
