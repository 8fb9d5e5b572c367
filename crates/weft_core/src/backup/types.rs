//! Shared types for the backup engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The archive's root manifest: `export-manifest.json`
///
/// Field names are part of the wire format; `app_version` stays snake_case
/// while `exportedAt` is camelCase, matching every archive in the wild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub app_version: String,
    #[serde(rename = "exportedAt")]
    pub exported_at: DateTime<Utc>,
}

impl ExportManifest {
    pub fn now() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
        }
    }
}

/// What an export actually wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportStats {
    pub chats: u64,
    pub groups: u64,
    pub binary_objects: u64,
    /// Uncompressed content bytes (chat trees + binary payloads)
    pub content_bytes: u64,
}

/// Options for exporting the store
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Free-text filename segment; sanitized and byte-budget truncated
    pub file_name: Option<String>,
}

/// Result of a completed export
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub file_name: String,
    pub manifest: ExportManifest,
    pub stats: ExportStats,
}

/// Import merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Wipe the store, then restore archive data verbatim
    Replace,
    /// Regenerate every identifier and merge alongside existing data
    Append,
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::Append => write!(f, "append"),
        }
    }
}
