//! Per-template pipeline shared by the daemon and the CLI.
//!
//! render → compare → stage → swap → check/notify → clean up.

use std::io::Write;
use std::path::Path;

use topogen_core::{MetadataSource, TemplateConfig, TemplateKind};
use topogen_renderer::TemplateEngine;

use crate::commands::{CommandOrchestrator, CommandRun};
use crate::diff::{read_existing_or_empty, unified_diff};
use crate::error::{io_err, SyncError};
use crate::writer::{is_unchanged, remove_staging, stage, swap_into_place_with, SwapMethod};

type Rename<'a> = &'a dyn Fn(&Path, &Path) -> std::io::Result<()>;

/// Options for one pass over the templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Render and compare only: never stage, write, or run commands.
    pub dry_run: bool,
}

/// What the pipeline did with one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutcome {
    /// Print mode: rendered bytes went to stdout.
    Printed,
    /// Destination already held the rendered bytes; commands skipped.
    Unchanged,
    /// Destination replaced, then commands ran.
    Updated { method: SwapMethod },
    /// Dry run: destination would change as shown.
    WouldWrite { diff: String },
    /// No source: commands ran (or would have, in a dry run).
    CommandsOnly,
}

/// Result of processing one template.
#[derive(Debug)]
pub struct TemplateReport {
    pub name: String,
    pub outcome: TemplateOutcome,
    pub commands: Vec<CommandRun>,
}

impl TemplateReport {
    /// Number of check/notify pairs that did not fully succeed.
    pub fn failed_commands(&self) -> usize {
        self.commands
            .iter()
            .filter(|run| !run.outcome.is_success())
            .count()
    }
}

/// Process one template against the snapshot behind `engine`.
///
/// `source` is handed to label fanout, which resolves its targets from a
/// freshly built snapshot. Print-mode output is written to `out`.
pub fn process_template(
    template: &TemplateConfig,
    engine: &TemplateEngine,
    source: &dyn MetadataSource,
    options: ProcessOptions,
    out: &mut dyn Write,
) -> Result<TemplateReport, SyncError> {
    process_template_with(template, engine, source, options, out, &|from, to| {
        std::fs::rename(from, to)
    })
}

fn process_template_with(
    template: &TemplateConfig,
    engine: &TemplateEngine,
    source: &dyn MetadataSource,
    options: ProcessOptions,
    out: &mut dyn Write,
    rename: Rename<'_>,
) -> Result<TemplateReport, SyncError> {
    let name = template.display_name();
    let report = |outcome, commands| TemplateReport {
        name: name.clone(),
        outcome,
        commands,
    };

    match template.kind() {
        TemplateKind::Print { source: path } => {
            let rendered = engine.render_file(path)?;
            out.write_all(&rendered)
                .and_then(|()| out.flush())
                .map_err(|e| io_err("<stdout>", e))?;
            Ok(report(TemplateOutcome::Printed, Vec::new()))
        }

        TemplateKind::CommandOnly => {
            if options.dry_run {
                tracing::info!("[dry-run] would run commands for {name}");
                return Ok(report(TemplateOutcome::CommandsOnly, Vec::new()));
            }
            let runs = CommandOrchestrator::new(template, source).run(None)?;
            Ok(report(TemplateOutcome::CommandsOnly, runs))
        }

        TemplateKind::Render { source: path, dest } => {
            let rendered = engine.render_file(path)?;
            if is_unchanged(dest, &rendered)? {
                tracing::debug!("unchanged: {}", dest.display());
                return Ok(report(TemplateOutcome::Unchanged, Vec::new()));
            }

            if options.dry_run {
                tracing::info!("[dry-run] would write: {}", dest.display());
                let current = read_existing_or_empty(dest)?;
                let diff = unified_diff(dest, &current, &String::from_utf8_lossy(&rendered));
                return Ok(report(TemplateOutcome::WouldWrite { diff }, Vec::new()));
            }

            let staging = stage(dest, &rendered)?;
            let method = match swap_into_place_with(&staging, dest, rename) {
                Ok(method) => method,
                Err(e) => {
                    remove_staging(&staging);
                    return Err(e);
                }
            };
            tracing::info!("wrote: {}", dest.display());

            let runs = CommandOrchestrator::new(template, source).run(Some(&staging));
            remove_staging(&staging);
            Ok(report(TemplateOutcome::Updated { method }, runs?))
        }
    }
}
