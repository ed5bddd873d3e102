use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use topogen_core::Config;

use crate::cycle::{CycleError, CycleOutcome, Poller};
use crate::error::{io_err, DaemonError};

/// Pause after a transient failure before waiting for the next tick.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// How the scheduler drives cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Exactly one cycle; its error is the result.
    OneShot,
    /// A cycle per period until a shutdown signal.
    Interval(Duration),
}

impl Mode {
    pub fn from_config(config: &Config) -> Self {
        if config.onetime {
            Mode::OneShot
        } else {
            Mode::Interval(config.interval_duration())
        }
    }
}

/// Build a runtime, forward process signals to the scheduler, and block
/// until it returns.
pub fn start_blocking(poller: Poller, mode: Mode) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);
        let signal_handle = {
            let shutdown = shutdown_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = forward_signals(shutdown).await {
                    tracing::error!("signal handler failed: {err}");
                }
            })
        };
        let result = run(poller, mode, shutdown_rx).await;
        signal_handle.abort();
        drop(shutdown_tx);
        result
    })
}

/// Run the scheduler until one-shot completion, a fatal error, or shutdown.
pub async fn run(
    poller: Poller,
    mode: Mode,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let period = match mode {
        Mode::OneShot => {
            tracing::info!("processing all templates once");
            let (_, result) = run_cycle(poller).await?;
            return one_shot_result(result);
        }
        Mode::Interval(period) => period,
    };

    tracing::info!("polling metadata every {}s", period.as_secs_f64());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // first tick is immediate

    let mut poller = poller;
    loop {
        let (returned, result) = run_cycle(poller).await?;
        poller = returned;

        match result {
            Ok(_) => {}
            Err(CycleError::Fatal(err)) => return Err(err.into()),
            Err(CycleError::Transient(err)) => {
                tracing::error!("{err}");
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("exit requested while backing off");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }

        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("exit requested by signal");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }
    }
}

/// Run one blocking cycle off the async workers, handing the poller back.
async fn run_cycle(
    mut poller: Poller,
) -> Result<(Poller, Result<CycleOutcome, CycleError>), DaemonError> {
    tokio::task::spawn_blocking(move || {
        let result = poller.poll();
        (poller, result)
    })
    .await
    .map_err(|err| DaemonError::Task(format!("poll cycle join error: {err}")))
}

fn one_shot_result(result: Result<CycleOutcome, CycleError>) -> Result<(), DaemonError> {
    match result {
        Ok(CycleOutcome::Processed(report)) if !report.failures.is_empty() => {
            Err(DaemonError::TemplatesFailed {
                count: report.failures.len(),
            })
        }
        Ok(_) => {
            tracing::info!("all templates processed, exiting");
            Ok(())
        }
        Err(CycleError::Transient(err)) => Err(err.into()),
        Err(CycleError::Fatal(err)) => Err(err.into()),
    }
}

/// Send on `shutdown` at the first SIGINT, SIGTERM or SIGQUIT.
async fn forward_signals(shutdown: broadcast::Sender<()>) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM", e))?;
    let mut quit = signal(SignalKind::quit()).map_err(|e| io_err("SIGQUIT", e))?;
    let name = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| io_err("SIGINT", e))?;
            "SIGINT"
        }
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    tracing::info!("received {name}, shutting down");
    let _ = shutdown.send(());
    Ok(())
}

/// Install the global subscriber on stderr. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
