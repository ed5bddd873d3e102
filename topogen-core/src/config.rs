//! Process configuration.
//!
//! A single YAML document lists the metadata endpoint, the polling mode, and
//! the templates to keep in sync:
//!
//! ```yaml
//! metadata_url: http://rancher-metadata
//! interval: 5
//! templates:
//!   - source: /etc/topogen/haproxy.cfg.tera
//!     dest: /etc/haproxy/haproxy.cfg
//!     check_cmd: "haproxy -c -f /etc/haproxy/haproxy.cfg"
//!     notify_cmd: "sv hup haproxy"
//! ```
//!
//! Commands run after the new file has been swapped into place, so checks
//! should read `dest`. `{{staging}}` still expands to the staging path, which
//! after an atomic rename no longer exists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};
use crate::http::{DEFAULT_API_VERSION, DEFAULT_METADATA_URL};
use crate::types::LabelSelector;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/topogen/config.yaml";
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

fn default_metadata_url() -> String {
    DEFAULT_METADATA_URL.to_string()
}

fn default_metadata_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root of the YAML configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    /// API version path segment appended to `metadata_url`.
    #[serde(default = "default_metadata_version")]
    pub metadata_version: String,
    /// Read metadata from this document instead of the HTTP service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<PathBuf>,
    /// Poll period in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Process all templates once and exit.
    #[serde(default)]
    pub onetime: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            metadata_version: default_metadata_version(),
            metadata_file: None,
            interval: default_interval(),
            onetime: false,
            log_level: default_log_level(),
            templates: Vec::new(),
        }
    }
}

/// One managed template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    /// Gate for `notify_cmd`. Runs after the swap; `{{staging}}` expands to
    /// the staging path, already moved onto `dest` by a rename.
    #[serde(default)]
    pub check_cmd: String,
    #[serde(default)]
    pub notify_cmd: String,
    /// `name` or `name:value`; fans check/notify out to matching containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_lbl: Option<String>,
    /// Log notify output at info level instead of debug.
    #[serde(default)]
    pub notify_output: bool,
}

/// What a template asks the pipeline to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind<'a> {
    /// Render `source`, write `dest`, then run commands.
    Render { source: &'a Path, dest: &'a Path },
    /// Render `source` to stdout only.
    Print { source: &'a Path },
    /// Nothing to render; run commands only.
    CommandOnly,
}

impl TemplateConfig {
    pub fn kind(&self) -> TemplateKind<'_> {
        match (self.source.as_deref(), self.dest.as_deref()) {
            (Some(source), Some(dest)) => TemplateKind::Render { source, dest },
            (Some(source), None) => TemplateKind::Print { source },
            (None, _) => TemplateKind::CommandOnly,
        }
    }

    /// Parsed `notify_lbl`, if any. An empty label means direct mode.
    pub fn label_selector(&self) -> Result<Option<LabelSelector>, ConfigError> {
        self.notify_lbl
            .as_deref()
            .filter(|lbl| !lbl.is_empty())
            .map(str::parse::<LabelSelector>)
            .transpose()
    }

    /// Short human-readable name used in logs.
    pub fn display_name(&self) -> String {
        match (&self.source, &self.dest) {
            (Some(source), Some(dest)) => format!("{} -> {}", source.display(), dest.display()),
            (Some(source), None) => format!("{} -> stdout", source.display()),
            (None, _) => match self.notify_lbl.as_deref() {
                Some(lbl) if !lbl.is_empty() => format!("commands [{lbl}]"),
                _ => "commands".to_string(),
            },
        }
    }
}

impl Config {
    /// Load and validate the configuration at `path`.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| config_io_err(path, e))?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::Invalid(
                "interval must be at least 1 second".to_string(),
            ));
        }
        for (idx, template) in self.templates.iter().enumerate() {
            if template.source.is_none()
                && template.check_cmd.is_empty()
                && template.notify_cmd.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "template #{} has no source and no commands",
                    idx + 1
                )));
            }
            if template.dest.is_some() && template.source.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "template #{} has a dest but no source",
                    idx + 1
                )));
            }
            template.label_selector()?;
        }
        Ok(())
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}
