//! `topogen diff`: show unified diffs for what the next run would write.

use anyhow::{bail, Context, Result};
use clap::Args;

use topogen_daemon::{init_tracing, open_metadata_source, CycleOutcome, Poller};
use topogen_sync::{ProcessOptions, TemplateOutcome};

use super::ConfigArgs;

/// Arguments for `topogen diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        init_tracing(&config.log_level);

        let source =
            open_metadata_source(&config).context("failed to initialize metadata source")?;
        let mut poller = Poller::new(
            config.templates.clone(),
            source,
            ProcessOptions { dry_run: true },
        );
        let outcome = poller
            .poll_into(&mut std::io::sink())
            .context("diff failed")?;
        let CycleOutcome::Processed(report) = outcome else {
            bail!("metadata version did not produce a cycle");
        };

        let mut shown = 0;
        for template in &report.templates {
            if let TemplateOutcome::WouldWrite { diff } = &template.outcome {
                print!("{diff}");
                if !diff.ends_with('\n') {
                    println!();
                }
                shown += 1;
            }
        }
        if shown == 0 {
            println!("No differences.");
        }

        for failure in &report.failures {
            eprintln!("{}: {}", failure.name, failure.error);
        }
        if !report.failures.is_empty() {
            bail!("{} template(s) failed", report.failures.len());
        }
        Ok(())
    }
}
