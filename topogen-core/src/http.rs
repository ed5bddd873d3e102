//! HTTP client for a Rancher-style metadata service.
//!
//! Endpoints, relative to `<url>/<api_version>`:
//!
//! | Call             | Path              | Body        |
//! |------------------|-------------------|-------------|
//! | `version`        | `/version`        | plain text  |
//! | `services`       | `/services`       | JSON array  |
//! | `containers`     | `/containers`     | JSON array  |
//! | `hosts`          | `/hosts`          | JSON array  |
//! | `self_container` | `/self/container` | JSON object |

use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::MetadataError;
use crate::metadata::{MetadataSource, RawContainer, RawHost, RawSelf, RawService};
use crate::types::MetadataVersion;

pub const DEFAULT_METADATA_URL: &str = "http://rancher-metadata";
pub const DEFAULT_API_VERSION: &str = "latest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking metadata client.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    agent: ureq::Agent,
    base: String,
}

impl HttpMetadataSource {
    /// Client for `<url>/<api_version>`. No request is made.
    pub fn new(url: &str, api_version: &str) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base: join_url(url, api_version),
        }
    }

    /// Build a client and block until the version endpoint answers.
    pub fn connect_and_wait(
        url: &str,
        api_version: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, MetadataError> {
        let client = Self::new(url, api_version);
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if client.version().is_ok() {
                return Ok(client);
            }
            if attempt < attempts {
                sleep(delay);
            }
        }
        Err(MetadataError::Unreachable {
            url: client.base.clone(),
            attempts,
        })
    }

    /// Fully-qualified base URL, including the API version segment.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn get(&self, path: &str) -> Result<(String, ureq::Response), MetadataError> {
        let url = format!("{}/{}", self.base, path);
        let response = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .call()
            .map_err(|e| MetadataError::Http {
                url: url.clone(),
                source: Box::new(e),
            })?;
        Ok((url, response))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let (url, response) = self.get(path)?;
        response
            .into_json()
            .map_err(|e| MetadataError::Decode { url, source: e })
    }
}

impl MetadataSource for HttpMetadataSource {
    fn version(&self) -> Result<MetadataVersion, MetadataError> {
        let (url, response) = self.get("version")?;
        let body = response
            .into_string()
            .map_err(|e| MetadataError::Decode { url, source: e })?;
        Ok(MetadataVersion::from(body.trim().trim_matches('"')))
    }

    fn services(&self) -> Result<Vec<RawService>, MetadataError> {
        self.get_json("services")
    }

    fn containers(&self) -> Result<Vec<RawContainer>, MetadataError> {
        self.get_json("containers")
    }

    fn hosts(&self) -> Result<Vec<RawHost>, MetadataError> {
        self.get_json("hosts")
    }

    fn self_container(&self) -> Result<RawSelf, MetadataError> {
        self.get_json("self/container")
    }
}

fn join_url(url: &str, api_version: &str) -> String {
    let url = url.trim_end_matches('/');
    let version = api_version.trim_matches('/');
    if version.is_empty() {
        url.to_string()
    } else {
        format!("{url}/{version}")
    }
}
