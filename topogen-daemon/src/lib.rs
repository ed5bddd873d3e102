//! Scheduler: polls metadata, diffs versions, and runs template cycles in
//! one-shot or interval mode with signal-driven graceful shutdown.

pub mod cycle;
mod error;
mod runtime;
#[cfg(test)]
mod testing;

pub use cycle::{
    open_metadata_source, CycleError, CycleOutcome, CycleReport, Poller, TemplateFailure,
};
pub use error::DaemonError;
pub use runtime::{init_tracing, run, start_blocking, Mode, RETRY_DELAY};
