pub mod diff;
pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use topogen_core::{config::DEFAULT_CONFIG_PATH, Config};

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the YAML configuration file.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Metadata service URL (overrides `metadata_url`).
    #[arg(long)]
    pub metadata_url: Option<String>,

    /// Read metadata from a YAML/JSON document instead of the service.
    #[arg(long)]
    pub metadata_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset (overrides `log_level`).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ConfigArgs {
    /// Load the file and apply command-line overrides.
    pub fn load(&self) -> Result<Config> {
        let mut config = Config::load_at(&self.config)
            .with_context(|| format!("failed to load config {}", self.config.display()))?;
        if let Some(url) = &self.metadata_url {
            config.metadata_url = url.clone();
        }
        if let Some(path) = &self.metadata_file {
            config.metadata_file = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}
