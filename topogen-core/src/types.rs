//! Snapshot entity types.
//!
//! These are the normalised, cross-referenced records templates see. They are
//! rebuilt from raw metadata on every poll cycle and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Label key → value mapping shared by hosts, containers and services.
pub type Labels = BTreeMap<String, String>;

/// Free-form service metadata (arbitrary JSON values).
pub type MetadataMap = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque metadata version token. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataVersion(pub String);

impl fmt::Display for MetadataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MetadataVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MetadataVersion {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A host in the fleet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub uuid: String,
    pub name: String,
    pub address: String,
    pub hostname: String,
    pub labels: Labels,
}

/// A container, with its host resolved by UUID.
///
/// `host` is the zero value when no host in the snapshot matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub address: String,
    pub stack: String,
    pub service: String,
    pub health: String,
    pub state: String,
    pub labels: Labels,
    pub host: Host,
}

/// One `public:internal/protocol` port mapping of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub public_port: String,
    pub internal_port: String,
    pub protocol: String,
}

/// A service and the containers that belong to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub stack: String,
    pub kind: String,
    pub vip: String,
    pub fqdn: String,
    pub labels: Labels,
    pub metadata: MetadataMap,
    pub containers: Vec<Container>,
    pub ports: Vec<ServicePort>,
}

/// Identity of the container this process runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfInfo {
    pub stack: String,
    pub service: String,
    pub host_uuid: String,
}

// ---------------------------------------------------------------------------
// Label selector
// ---------------------------------------------------------------------------

/// `name` or `name:value` label selector.
///
/// Without a value every label with key `name` matches; with a value the
/// label's value must be exactly equal. An empty value (`name:`) behaves like
/// a bare `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    pub name: String,
    pub value: Option<String>,
}

impl LabelSelector {
    /// Whether `labels` carries a label satisfying this selector.
    pub fn matches(&self, labels: &Labels) -> bool {
        match (labels.get(&self.name), self.value.as_deref()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(wanted)) => actual == wanted,
        }
    }
}

impl FromStr for LabelSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = match s.split_once(':') {
            Some((name, value)) => (name, Some(value)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(ConfigError::InvalidSelector(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.filter(|v| !v.is_empty()).map(str::to_string),
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.name, value),
            None => self.name.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn version_equality_is_textual() {
        assert_eq!(MetadataVersion::from("42"), MetadataVersion::from(String::from("42")));
        assert_ne!(MetadataVersion::from("42"), MetadataVersion::from("43"));
        assert_eq!(MetadataVersion::from("abc").to_string(), "abc");
    }

    #[test]
    fn bare_selector_matches_any_value() {
        let sel: LabelSelector = "role".parse().unwrap();
        assert_eq!(sel.value, None);
        assert!(sel.matches(&labels(&[("role", "worker")])));
        assert!(sel.matches(&labels(&[("role", "")])));
        assert!(!sel.matches(&labels(&[("tier", "worker")])));
    }

    #[test]
    fn valued_selector_requires_exact_value() {
        let sel: LabelSelector = "role:worker".parse().unwrap();
        assert!(sel.matches(&labels(&[("role", "worker")])));
        assert!(!sel.matches(&labels(&[("role", "leader")])));
        assert!(!sel.matches(&labels(&[("role", "Worker")])));
    }

    #[test]
    fn selector_value_may_contain_colons() {
        let sel: LabelSelector = "endpoint:tcp://db:5432".parse().unwrap();
        assert_eq!(sel.name, "endpoint");
        assert_eq!(sel.value.as_deref(), Some("tcp://db:5432"));
        assert_eq!(sel.to_string(), "endpoint:tcp://db:5432");
    }

    #[test]
    fn empty_value_is_treated_as_bare_name() {
        let sel: LabelSelector = "role:".parse().unwrap();
        assert_eq!(sel.value, None);
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!("".parse::<LabelSelector>().is_err());
        assert!(":worker".parse::<LabelSelector>().is_err());
    }

    #[test]
    fn missing_host_is_zero_value() {
        let c = Container::default();
        assert_eq!(c.host, Host::default());
        assert!(c.host.uuid.is_empty());
    }
}
