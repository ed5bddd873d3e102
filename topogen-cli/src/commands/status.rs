//! `topogen status`: per-template destination status.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use topogen_core::{MetadataSource, TemplateConfig};
use topogen_daemon::{init_tracing, open_metadata_source};
use topogen_renderer::{ContextBuilder, TemplateEngine};
use topogen_sync::{template_status, TemplateStatus};

use super::ConfigArgs;

/// Arguments for `topogen status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusReportJson {
    version: String,
    templates: Vec<TemplateStatusJson>,
}

#[derive(Serialize)]
struct TemplateStatusJson {
    template: String,
    dest: Option<String>,
    status: &'static str,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "template")]
    template: String,
    #[tabled(rename = "destination")]
    dest: String,
    #[tabled(rename = "status")]
    status: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        init_tracing(&config.log_level);

        let source =
            open_metadata_source(&config).context("failed to initialize metadata source")?;
        let version = source.version().context("failed to read metadata version")?;
        let ctx = ContextBuilder::new(source.as_ref())
            .build_shared()
            .context("failed to build metadata snapshot")?;
        let engine = TemplateEngine::new(ctx);

        let mut rows = Vec::with_capacity(config.templates.len());
        for template in &config.templates {
            let status = template_status(template, &engine)
                .with_context(|| format!("status check failed for {}", template.display_name()))?;
            rows.push((template, status));
        }

        if self.json {
            let payload = StatusReportJson {
                version: version.0,
                templates: rows
                    .iter()
                    .map(|(template, status)| TemplateStatusJson {
                        template: template.display_name(),
                        dest: dest_of(template),
                        status: status_key(*status),
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&version.0, &rows);
        Ok(())
    }
}

fn print_table(version: &str, rows: &[(&TemplateConfig, TemplateStatus)]) {
    let stale = rows
        .iter()
        .filter(|(_, s)| matches!(s, TemplateStatus::Stale | TemplateStatus::Missing))
        .count();
    println!(
        "topogen v{} | metadata version {} | {} templates | {} need a run",
        env!("CARGO_PKG_VERSION"),
        version,
        rows.len(),
        stale,
    );
    if rows.is_empty() {
        println!("No templates configured.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .iter()
        .map(|(template, status)| StatusTableRow {
            template: template
                .source
                .as_ref()
                .map_or_else(|| template.display_name(), |s| s.display().to_string()),
            dest: dest_of(template).unwrap_or_else(|| "-".to_string()),
            status: colored_status(*status),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn dest_of(template: &TemplateConfig) -> Option<String> {
    template.dest.as_ref().map(|d| d.display().to_string())
}

fn status_key(status: TemplateStatus) -> &'static str {
    match status {
        TemplateStatus::UpToDate => "up_to_date",
        TemplateStatus::Stale => "stale",
        TemplateStatus::Missing => "missing",
        TemplateStatus::NoDestination => "no_destination",
    }
}

fn colored_status(status: TemplateStatus) -> String {
    let label = status.as_str();
    match status {
        TemplateStatus::UpToDate => label.green().to_string(),
        TemplateStatus::Stale => label.yellow().to_string(),
        TemplateStatus::Missing => label.red().to_string(),
        TemplateStatus::NoDestination => label.bright_black().to_string(),
    }
}
