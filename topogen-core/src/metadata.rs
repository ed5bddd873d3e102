//! Metadata collaborator: the [`MetadataSource`] trait, the raw records it
//! returns, and the file-backed source.
//!
//! Raw records use the Rancher metadata JSON schema (`snake_case` keys). Any
//! key the service omits or sends as `null` falls back to its default, so
//! partial documents are accepted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{metadata_io_err, MetadataError};
use crate::types::{Labels, MetadataMap, MetadataVersion};

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// Reads an explicit `null` as the field's default.
///
/// The metadata service sends `null` for unset fields such as `health_state`
/// or `vip`; `#[serde(default)]` alone only covers absent keys.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Host as reported by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawHost {
    #[serde(deserialize_with = "null_as_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub agent_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Labels,
}

/// Container as reported by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContainer {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub primary_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub stack_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub service_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub health_state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Labels,
    #[serde(deserialize_with = "null_as_default")]
    pub host_uuid: String,
}

/// Service as reported by the metadata service. `ports` are unparsed strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawService {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub stack_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fqdn: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Labels,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: MetadataMap,
    #[serde(deserialize_with = "null_as_default")]
    pub ports: Vec<String>,
}

/// The container the process itself runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSelf {
    #[serde(deserialize_with = "null_as_default")]
    pub stack_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub service_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub host_uuid: String,
}

// ---------------------------------------------------------------------------
// MetadataSource
// ---------------------------------------------------------------------------

/// A versioned view of the fleet.
///
/// Calls block (network round trip or disk read). The version token is opaque
/// and compared only for equality.
pub trait MetadataSource: Send + Sync {
    fn version(&self) -> Result<MetadataVersion, MetadataError>;
    fn services(&self) -> Result<Vec<RawService>, MetadataError>;
    fn containers(&self) -> Result<Vec<RawContainer>, MetadataError>;
    fn hosts(&self) -> Result<Vec<RawHost>, MetadataError>;
    fn self_container(&self) -> Result<RawSelf, MetadataError>;
}

// ---------------------------------------------------------------------------
// In-memory document
// ---------------------------------------------------------------------------

/// A complete metadata snapshot held in memory.
///
/// This is the on-disk format read by [`FileMetadataSource`]; it is also a
/// [`MetadataSource`] on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataDocument {
    pub version: Option<String>,
    pub services: Vec<RawService>,
    pub containers: Vec<RawContainer>,
    pub hosts: Vec<RawHost>,
    #[serde(rename = "self")]
    pub self_container: RawSelf,
}

impl MetadataSource for MetadataDocument {
    fn version(&self) -> Result<MetadataVersion, MetadataError> {
        Ok(MetadataVersion::from(
            self.version.clone().unwrap_or_default(),
        ))
    }

    fn services(&self) -> Result<Vec<RawService>, MetadataError> {
        Ok(self.services.clone())
    }

    fn containers(&self) -> Result<Vec<RawContainer>, MetadataError> {
        Ok(self.containers.clone())
    }

    fn hosts(&self) -> Result<Vec<RawHost>, MetadataError> {
        Ok(self.hosts.clone())
    }

    fn self_container(&self) -> Result<RawSelf, MetadataError> {
        Ok(self.self_container.clone())
    }
}

// ---------------------------------------------------------------------------
// FileMetadataSource
// ---------------------------------------------------------------------------

/// Reads a [`MetadataDocument`] (YAML or JSON) from disk on every call.
///
/// When the document has no `version`, the SHA-256 of the file bytes is used,
/// so any edit to the file counts as a metadata change.
#[derive(Debug, Clone)]
pub struct FileMetadataSource {
    path: PathBuf,
}

impl FileMetadataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<(Vec<u8>, MetadataDocument), MetadataError> {
        let bytes = std::fs::read(&self.path).map_err(|e| metadata_io_err(&self.path, e))?;
        let doc = serde_yaml::from_slice(&bytes).map_err(|e| MetadataError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        Ok((bytes, doc))
    }
}

impl MetadataSource for FileMetadataSource {
    fn version(&self) -> Result<MetadataVersion, MetadataError> {
        let (bytes, doc) = self.read()?;
        Ok(match doc.version {
            Some(v) => MetadataVersion::from(v),
            None => MetadataVersion::from(hex::encode(Sha256::digest(&bytes))),
        })
    }

    fn services(&self) -> Result<Vec<RawService>, MetadataError> {
        Ok(self.read()?.1.services)
    }

    fn containers(&self) -> Result<Vec<RawContainer>, MetadataError> {
        Ok(self.read()?.1.containers)
    }

    fn hosts(&self) -> Result<Vec<RawHost>, MetadataError> {
        Ok(self.read()?.1.hosts)
    }

    fn self_container(&self) -> Result<RawSelf, MetadataError> {
        Ok(self.read()?.1.self_container)
    }
}
