//! Backup preferences
//!
//! Small TOML-backed config for the pieces of backup behavior users tune:
//! the export filename segment and the naming prefixes applied to
//! append-imported chats and groups.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backup::{AppendOptions, ExportOptions};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Free-text segment inserted into export filenames
    pub export_name: Option<String>,
    /// Prefix applied to imported chat titles during append
    pub append_chat_prefix: Option<String>,
    /// Prefix applied to imported group names during append
    pub append_group_prefix: Option<String>,
}

impl BackupConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CoreError::ConfigError {
            path: "<inline>".to_string(),
            cause: Box::new(e),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io(format!("reading {}", path.display()), e))?;
        toml::from_str(&raw).map_err(|e| CoreError::ConfigError {
            path: path.display().to_string(),
            cause: Box::new(e),
        })
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            file_name: self.export_name.clone(),
        }
    }

    pub fn append_options(&self) -> AppendOptions {
        AppendOptions {
            chat_title_prefix: self.append_chat_prefix.clone(),
            group_name_prefix: self.append_group_prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_empty() {
        let config = BackupConfig::from_toml_str("").unwrap();
        assert_eq!(config, BackupConfig::default());
        assert!(config.export_options().file_name.is_none());
    }

    #[test]
    fn test_parse_prefixes() {
        let config = BackupConfig::from_toml_str(
            r#"
            export_name = "laptop"
            append_chat_prefix = "[imported] "
            "#,
        )
        .unwrap();
        assert_eq!(config.export_name.as_deref(), Some("laptop"));
        assert_eq!(
            config.append_options().chat_title_prefix.as_deref(),
            Some("[imported] ")
        );
        assert!(config.append_options().group_name_prefix.is_none());
    }
}
