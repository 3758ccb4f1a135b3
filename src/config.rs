//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides:
//!
//! ```rust
//! use sidelayout::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "photoBaseUrl": "https://cdn.example.com/files" }"#).unwrap();
//! assert_eq!(config.protection_window_ms, 5000);
//! assert_eq!(config.photo_url("abc").as_deref(), Some("https://cdn.example.com/files/abc"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LayoutResult;
use crate::layout::model::{DEFAULT_DOOR_HEIGHT, DEFAULT_DOOR_WIDTH};

/// Inbound snapshots are refused for this long after a local edit (ms).
pub const PROTECTION_WINDOW_MS: u64 = 5000;
/// Extra time the saving flag stays up after an asynchronous save settles (ms).
pub const SAVE_GRACE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub protection_window_ms: u64,
    pub save_grace_ms: u64,
    /// Width of a newly added door (cm).
    pub door_width: f64,
    /// Opening height of a newly added door (cm).
    pub door_height: f64,
    /// Base URL persisted photos are served from.
    pub photo_base_url: Option<String>,
    /// Prefix for exported drawing file names, usually the task name.
    pub task_prefix: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protection_window_ms: PROTECTION_WINDOW_MS,
            save_grace_ms: SAVE_GRACE_MS,
            door_width: DEFAULT_DOOR_WIDTH,
            door_height: DEFAULT_DOOR_HEIGHT,
            photo_base_url: None,
            task_prefix: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a (possibly partial) JSON config.
    pub fn from_json(json: &str) -> LayoutResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder: Set photo base URL.
    pub fn with_photo_base_url(mut self, url: impl Into<String>) -> Self {
        self.photo_base_url = Some(url.into());
        self
    }

    /// Builder: Set export task prefix.
    pub fn with_task_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.task_prefix = Some(prefix.into());
        self
    }

    /// URL of a persisted photo, if a base URL is configured.
    pub fn photo_url(&self, photo_id: &str) -> Option<String> {
        self.photo_base_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), photo_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.protection_window_ms, 5000);
        assert_eq!(config.save_grace_ms, 500);
        assert_eq!(config.door_width, 100.0);
        assert_eq!(config.door_height, 190.0);
        assert_eq!(config.photo_url("x"), None);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"doorWidth": 90, "taskPrefix": "OS-42"}"#).unwrap();
        assert_eq!(config.door_width, 90.0);
        assert_eq!(config.task_prefix.as_deref(), Some("OS-42"));
        assert_eq!(config.save_grace_ms, 500);

        assert!(EngineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_photo_url_trims_slash() {
        let config = EngineConfig::new().with_photo_base_url("https://files.local/");
        assert_eq!(config.photo_url("p1").as_deref(), Some("https://files.local/p1"));
    }
}
