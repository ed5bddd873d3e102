//! One poll cycle: version check, snapshot build, per-template processing.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use topogen_core::{
    Config, FileMetadataSource, HttpMetadataSource, MetadataError, MetadataSource,
    MetadataVersion, TemplateConfig,
};
use topogen_renderer::{ContextBuilder, TemplateEngine};
use topogen_sync::{process_template, ProcessOptions, SyncError, TemplateReport};

/// Startup attempts against the metadata service before giving up.
pub const CONNECT_ATTEMPTS: u32 = 30;
pub const CONNECT_DELAY: Duration = Duration::from_secs(2);

/// Metadata source named by `config`: the file when set, else HTTP.
///
/// The HTTP source blocks until the service answers.
pub fn open_metadata_source(config: &Config) -> Result<Arc<dyn MetadataSource>, MetadataError> {
    if let Some(path) = &config.metadata_file {
        tracing::info!("reading metadata from {}", path.display());
        return Ok(Arc::new(FileMetadataSource::new(path)));
    }
    tracing::info!(
        "initializing metadata client for {} (version {})",
        config.metadata_url,
        config.metadata_version
    );
    let client = HttpMetadataSource::connect_and_wait(
        &config.metadata_url,
        &config.metadata_version,
        CONNECT_ATTEMPTS,
        CONNECT_DELAY,
    )?;
    Ok(Arc::new(client))
}

/// Why a cycle stopped early.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Metadata could not be fetched; retry on the next tick.
    #[error("transient: {0}")]
    Transient(#[from] MetadataError),
    /// A template could not be rendered; the run must stop.
    #[error("fatal: {0}")]
    Fatal(SyncError),
}

/// A template that failed without stopping the cycle.
#[derive(Debug)]
pub struct TemplateFailure {
    pub name: String,
    pub error: SyncError,
}

/// Everything one processed cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub version: MetadataVersion,
    pub templates: Vec<TemplateReport>,
    pub failures: Vec<TemplateFailure>,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Version matched the last processed one; nothing was done.
    Unchanged,
    Processed(CycleReport),
}

/// Polls a metadata source and drives templates when its version changes.
pub struct Poller {
    templates: Vec<TemplateConfig>,
    source: Arc<dyn MetadataSource>,
    options: ProcessOptions,
    last_version: Option<MetadataVersion>,
}

impl Poller {
    pub fn new(
        templates: Vec<TemplateConfig>,
        source: Arc<dyn MetadataSource>,
        options: ProcessOptions,
    ) -> Self {
        Self {
            templates,
            source,
            options,
            last_version: None,
        }
    }

    /// Version of the last successfully built snapshot.
    pub fn last_version(&self) -> Option<&MetadataVersion> {
        self.last_version.as_ref()
    }

    /// Run one cycle, printing print-mode templates to stdout.
    pub fn poll(&mut self) -> Result<CycleOutcome, CycleError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.poll_into(&mut out)
    }

    /// Run one cycle, writing print-mode templates to `out`.
    pub fn poll_into(&mut self, out: &mut dyn Write) -> Result<CycleOutcome, CycleError> {
        tracing::debug!("checking for metadata change");
        let version = self.source.version()?;
        if self.last_version.as_ref() == Some(&version) {
            tracing::debug!("no changes in metadata");
            return Ok(CycleOutcome::Unchanged);
        }
        tracing::debug!(
            "old version: {}, new version: {version}",
            self.last_version
                .as_ref()
                .map_or("none", |v| v.0.as_str())
        );

        let ctx = ContextBuilder::new(self.source.as_ref()).build_shared()?;
        self.last_version = Some(version.clone());
        let engine = TemplateEngine::new(ctx);

        let mut templates = Vec::with_capacity(self.templates.len());
        let mut failures = Vec::new();
        for template in &self.templates {
            let name = template.display_name();
            match process_template(template, &engine, self.source.as_ref(), self.options, out) {
                Ok(report) => {
                    if report.failed_commands() > 0 {
                        tracing::warn!("{name}: {} command(s) failed", report.failed_commands());
                    }
                    templates.push(report);
                }
                Err(error) if error.is_fatal() => return Err(CycleError::Fatal(error)),
                Err(error) => {
                    tracing::error!("{name}: {error}");
                    failures.push(TemplateFailure { name, error });
                }
            }
        }
        tracing::info!("all templates processed (metadata version {version})");

        Ok(CycleOutcome::Processed(CycleReport {
            version,
            templates,
            failures,
        }))
    }
}
