/// Session configuration and the signed-in identity.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::Priority;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Remote collection holding one document per board.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_new_column_title")]
    pub new_column_title: String,
    #[serde(default = "default_board_color")]
    pub default_board_color: String,
    #[serde(default)]
    pub default_priority: Priority,
}

fn default_collection() -> String {
    "boards".to_string()
}

fn default_new_column_title() -> String {
    "New column".to_string()
}

fn default_board_color() -> String {
    "#667eea".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            new_column_title: default_new_column_title(),
            default_board_color: default_board_color(),
            default_priority: Priority::default(),
        }
    }
}

/// Load config from path. Returns default if the file is missing or invalid.
pub fn load_config(path: &Path) -> SyncConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[taskboard.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            SyncConfig::default()
        }),
        Err(e) => {
            log::debug!(
                "[taskboard.config] No config at {} ({}), using defaults",
                path.display(),
                e
            );
            SyncConfig::default()
        }
    }
}

/// Identity reported by the auth provider. Anonymous sessions have no email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/taskboard.json"));
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.collection, "boards");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"collection": "team-boards", "defaultPriority": "high"}}"#).unwrap();

        let config = load_config(tmp.path());
        assert_eq!(config.collection, "team-boards");
        assert_eq!(config.default_priority, Priority::High);
        assert_eq!(config.new_column_title, "New column");
        assert_eq!(config.default_board_color, "#667eea");
    }

    #[test]
    fn test_invalid_file_yields_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "not json").unwrap();
        assert_eq!(load_config(tmp.path()), SyncConfig::default());
    }
}
