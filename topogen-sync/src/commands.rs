//! Check/notify command orchestration.
//!
//! Direct mode runs `check_cmd` once and, if it succeeds, `notify_cmd` once.
//! Label-fanout mode (`notify_lbl` set) repeats that pair for every container
//! whose labels match, with per-container tokens substituted first.
//!
//! Token grammar, applied in one non-recursive pass:
//!
//! | Token                                  | Replaced with                     |
//! |----------------------------------------|-----------------------------------|
//! | `{{staging}}`                          | staging file path (plain replace) |
//! | `{{Name}}` `{{Address}}` `{{Stack}}`   | container attribute               |
//! | `{{Service}}` `{{Health}}` `{{State}}` | container attribute               |
//! | `{{Host.Name}}` `{{Host.Address}}`     | attribute of the container's host |
//! | `{{Host.Hostname}}` `{{Host.UUID}}`    | attribute of the container's host |
//! | `{{Labels.<key>}}`                     | label value, empty when absent    |
//!
//! A leading dot (`{{.Name}}`) is accepted. Anything else is left verbatim.

use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::Level;

use topogen_core::{Container, LabelSelector, MetadataSource, TemplateConfig};
use topogen_renderer::ContextBuilder;

use crate::error::{CommandError, SyncError};

const SHELL: &str = "/bin/sh";
const STAGING_TOKEN: &str = "{{staging}}";

static CONTAINER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\.?([\w.\-/]*)\}\}").expect("container token pattern"));

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What happened to one check/notify pair.
#[derive(Debug)]
pub enum CommandOutcome {
    /// Check passed (or was empty) and notify ran (or was empty).
    Notified,
    /// Check failed; notify was skipped.
    CheckFailed(CommandError),
    /// Check passed; notify failed.
    NotifyFailed(CommandError),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Notified)
    }
}

/// One executed check/notify pair, after token substitution.
#[derive(Debug)]
pub struct CommandRun {
    /// Fanout target; `None` in direct mode.
    pub container: Option<String>,
    pub check_cmd: String,
    pub notify_cmd: String,
    pub outcome: CommandOutcome,
}

// ---------------------------------------------------------------------------
// Shell execution
// ---------------------------------------------------------------------------

/// Run `command` through `/bin/sh -c` and return stdout followed by stderr.
pub fn run_shell(command: &str) -> Result<String, CommandError> {
    let output = Command::new(SHELL)
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|e| CommandError::Launch {
            command: command.to_string(),
            source: e,
        })?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.status.success() {
        Ok(combined)
    } else {
        Err(CommandError::Failed {
            command: command.to_string(),
            status: output.status.code(),
            output: combined,
        })
    }
}

fn log_output(level: Level, command: &str, output: &str) {
    for line in output.lines() {
        tracing::log!(level, "[{command}]: {line:?}");
    }
}

/// Run `check_cmd`, then `notify_cmd` if the check passed.
///
/// Empty commands are skipped and count as success.
pub fn run_check_notify(check_cmd: &str, notify_cmd: &str, verbose: bool) -> CommandOutcome {
    if !check_cmd.is_empty() {
        tracing::debug!("running check: {check_cmd}");
        match run_shell(check_cmd) {
            Ok(output) => log_output(Level::Debug, check_cmd, &output),
            Err(err) => {
                tracing::info!("check failed, skipping notify: {err}");
                if let CommandError::Failed { output, .. } = &err {
                    log_output(Level::Info, check_cmd, output);
                }
                return CommandOutcome::CheckFailed(err);
            }
        }
    }

    if notify_cmd.is_empty() {
        return CommandOutcome::Notified;
    }
    tracing::debug!("running notify: {notify_cmd}");
    match run_shell(notify_cmd) {
        Ok(output) => {
            log_output(Level::Debug, notify_cmd, &output);
            if verbose {
                log_output(Level::Info, notify_cmd, &output);
            }
            CommandOutcome::Notified
        }
        Err(err) => {
            tracing::error!("notify failed: {err}");
            if let CommandError::Failed { output, .. } = &err {
                log_output(Level::Debug, notify_cmd, output);
                if verbose {
                    log_output(Level::Info, notify_cmd, output);
                }
            }
            CommandOutcome::NotifyFailed(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Token substitution
// ---------------------------------------------------------------------------

/// Replace every literal `{{staging}}` with `staging`.
pub fn substitute_staging(command: &str, staging: Option<&Path>) -> String {
    match staging {
        Some(path) => command.replace(STAGING_TOKEN, &path.to_string_lossy()),
        None => command.to_string(),
    }
}

/// Value of a known container field, `None` when `field` is not one.
fn container_field<'a>(container: &'a Container, field: &str) -> Option<&'a str> {
    if let Some(key) = field.strip_prefix("Labels.") {
        return Some(container.labels.get(key).map_or("", String::as_str));
    }
    let value = match field {
        "Name" => &container.name,
        "Address" => &container.address,
        "Stack" => &container.stack,
        "Service" => &container.service,
        "Health" => &container.health,
        "State" => &container.state,
        "Host.Name" => &container.host.name,
        "Host.Address" => &container.host.address,
        "Host.Hostname" => &container.host.hostname,
        "Host.UUID" => &container.host.uuid,
        _ => return None,
    };
    Some(value.as_str())
}

/// Substitute per-container tokens in `command`.
///
/// Replacement text is never rescanned.
pub fn substitute_container_tokens(command: &str, container: &Container) -> String {
    CONTAINER_TOKEN
        .replace_all(command, |caps: &Captures<'_>| {
            match container_field(container, &caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Containers matching `selector`, in snapshot order.
pub fn label_group<'a>(containers: &'a [Container], selector: &LabelSelector) -> Vec<&'a Container> {
    containers
        .iter()
        .filter(|c| selector.matches(&c.labels))
        .collect()
}

// ---------------------------------------------------------------------------
// CommandOrchestrator
// ---------------------------------------------------------------------------

/// Runs one template's check/notify commands in direct or fanout mode.
pub struct CommandOrchestrator<'a> {
    template: &'a TemplateConfig,
    source: &'a dyn MetadataSource,
}

impl<'a> CommandOrchestrator<'a> {
    pub fn new(template: &'a TemplateConfig, source: &'a dyn MetadataSource) -> Self {
        Self { template, source }
    }

    /// Run the commands. `staging` is the staging path of a written template.
    ///
    /// Command failures are reported in the returned runs, never as `Err`;
    /// `Err` means the fanout target set could not be resolved.
    pub fn run(&self, staging: Option<&Path>) -> Result<Vec<CommandRun>, SyncError> {
        let check = substitute_staging(&self.template.check_cmd, staging);
        let notify = substitute_staging(&self.template.notify_cmd, staging);
        let verbose = self.template.notify_output;

        let Some(selector) = self.template.label_selector()? else {
            let outcome = run_check_notify(&check, &notify, verbose);
            return Ok(vec![CommandRun {
                container: None,
                check_cmd: check,
                notify_cmd: notify,
                outcome,
            }]);
        };

        let ctx = ContextBuilder::new(self.source).build()?;
        let group = label_group(&ctx.containers, &selector);
        tracing::debug!("label {selector} matched {} containers", group.len());

        let runs = group
            .into_iter()
            .map(|container| {
                let check_cmd = substitute_container_tokens(&check, container);
                let notify_cmd = substitute_container_tokens(&notify, container);
                let outcome = run_check_notify(&check_cmd, &notify_cmd, verbose);
                if !outcome.is_success() {
                    tracing::warn!("commands for container {} failed", container.name);
                }
                CommandRun {
                    container: Some(container.name.clone()),
                    check_cmd,
                    notify_cmd,
                    outcome,
                }
            })
            .collect();
        Ok(runs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
