//! topogen core library: snapshot types, metadata sources, configuration.
//!
//! - [`types`]: snapshot entities and the label selector
//! - [`metadata`]: [`MetadataSource`] trait, raw records, file-backed source
//! - [`http`]: HTTP metadata client
//! - [`config`]: YAML process configuration
//! - [`error`]: [`ConfigError`], [`MetadataError`]

pub mod config;
pub mod error;
pub mod http;
pub mod metadata;
pub mod types;

pub use config::{Config, TemplateConfig, TemplateKind};
pub use error::{ConfigError, MetadataError};
pub use http::HttpMetadataSource;
pub use metadata::{
    FileMetadataSource, MetadataDocument, MetadataSource, RawContainer, RawHost, RawSelf,
    RawService,
};
pub use types::{
    Container, Host, LabelSelector, Labels, MetadataMap, MetadataVersion, SelfInfo, Service,
    ServicePort,
};
