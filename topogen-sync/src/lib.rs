//! # topogen-sync
//!
//! Digest-gated staged writes and check/notify orchestration.
//!
//! [`process_template`] runs one configured template through the whole
//! pipeline; [`writer`] and [`commands`] expose the individual steps.

pub mod commands;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod writer;

pub use commands::{CommandOrchestrator, CommandOutcome, CommandRun};
pub use diff::{template_status, TemplateStatus};
pub use error::{CommandError, SyncError};
pub use pipeline::{process_template, ProcessOptions, TemplateOutcome, TemplateReport};
pub use writer::SwapMethod;
