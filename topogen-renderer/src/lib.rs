//! # topogen-renderer
//!
//! Builds the per-cycle topology snapshot and renders Tera templates against
//! it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use topogen_core::FileMetadataSource;
//! use topogen_renderer::{ContextBuilder, TemplateEngine};
//!
//! fn render(metadata: &Path, template: &Path) {
//!     let source = FileMetadataSource::new(metadata);
//!     if let Ok(ctx) = ContextBuilder::new(&source).build_shared() {
//!         let engine = TemplateEngine::new(ctx);
//!         if let Ok(bytes) = engine.render_file(template) {
//!             println!("{} bytes", bytes.len());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{parse_service_ports, ContextBuilder, TemplateContext};
pub use engine::TemplateEngine;
pub use error::RenderError;
