//! Tree configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a [`TreeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tree configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for a [`StateTree`](crate::tree::StateTree).
///
/// Missing fields take their default values.
///
/// ```rust
/// use mindset_hsm::config::TreeConfig;
///
/// let config = TreeConfig::from_json(r#"{ "record_lifecycle": true }"#).unwrap();
/// assert!(config.record_lifecycle);
/// assert_eq!(config.lifecycle_capacity, Some(1024));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Append every notification to the tree's lifecycle log.
    pub record_lifecycle: bool,
    /// Maximum number of logged events; `None` keeps everything.
    pub lifecycle_capacity: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            record_lifecycle: false,
            lifecycle_capacity: Some(1024),
        }
    }
}

impl TreeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn recording(mut self) -> Self {
        self.record_lifecycle = true;
        self
    }
}
