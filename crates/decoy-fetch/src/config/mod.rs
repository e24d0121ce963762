//! Configuration types for the fetch double.

mod fixture;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FetchMockError, Result};

pub use fixture::{FixtureFile, RouteFixture};

/// Process-wide defaults for a [`FetchMock`](crate::FetchMock).
///
/// `send_as_json` and `include_content_length` can be overridden per response;
/// `overwrite_routes` can be overridden per route. The response or route level
/// value always wins when present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    /// Forward unmatched calls to the native fetch when no fallback response is set.
    #[serde(default)]
    pub fallback_to_network: bool,

    /// Add a `Content-Length` header to string bodies.
    #[serde(default = "default_true")]
    pub include_content_length: bool,

    /// Serialize object bodies as JSON and set `Content-Type: application/json`.
    #[serde(default = "default_true")]
    pub send_as_json: bool,

    /// Emit a warning for every unmatched call.
    #[serde(default = "default_true")]
    pub warn_on_fallback: bool,

    /// Name clash policy: `Some(true)` replaces, `Some(false)` keeps both,
    /// `None` rejects the clashing registration.
    #[serde(default = "default_overwrite_routes")]
    pub overwrite_routes: Option<bool>,
}

fn default_true() -> bool {
    true
}

fn default_overwrite_routes() -> Option<bool> {
    Some(true)
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fallback_to_network: false,
            include_content_length: true,
            send_as_json: true,
            warn_on_fallback: true,
            overwrite_routes: default_overwrite_routes(),
        }
    }
}

impl MockConfig {
    /// Parse a config from YAML (JSON is accepted too, being a YAML subset).
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: MockConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Load a config from a YAML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FetchMockError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }
}
