//! `topogen run`: the scheduler, in interval or one-shot mode.

use anyhow::{Context, Result};
use clap::Args;

use topogen_daemon::{init_tracing, open_metadata_source, start_blocking, Mode, Poller};
use topogen_sync::ProcessOptions;

use super::ConfigArgs;

/// Arguments for `topogen run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Process all templates once and exit.
    #[arg(long)]
    pub onetime: bool,

    /// Poll period in seconds (overrides `interval`).
    #[arg(long)]
    pub interval: Option<u64>,

    /// Render and compare only; never write files or run commands.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let mut config = self.config.load()?;
        if self.onetime {
            config.onetime = true;
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        config.validate().context("invalid configuration")?;
        init_tracing(&config.log_level);

        let source =
            open_metadata_source(&config).context("failed to initialize metadata source")?;
        let poller = Poller::new(
            config.templates.clone(),
            source,
            ProcessOptions {
                dry_run: self.dry_run,
            },
        );
        start_blocking(poller, Mode::from_config(&config)).context("topogen run failed")
    }
}
