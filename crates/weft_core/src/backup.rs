//! Backup engine: streaming export and import of the whole store
//!
//! Export serializes a [`crate::snapshot::Snapshot`] into a compressed zip
//! archive with a fixed layout; import reads such an archive back under one
//! of two strategies — a destructive, verify-gated Replace or a
//! non-destructive, id-remapping Append.

mod analyze;
mod append;
mod reader;
mod replace;
mod session;
mod settings_merge;
mod types;
mod verify;
mod writer;

pub use analyze::{ArchiveAnalysis, analyze};
pub use append::{AppendOptions, plan_append};
pub use reader::{Archive, ArchiveBytes, ArchiveSource, ReadSeek};
pub use replace::plan_replace;
pub use session::{ImportOptions, ImportPhase, ImportReport, ImportSession};
pub use settings_merge::{MergeStrategy, SettingsMergeSpec, merge_settings};
pub use types::{ExportManifest, ExportOptions, ExportOutcome, ExportStats, ImportMode};
pub use verify::{VerifyReport, verify_snapshot};
pub use writer::{export_file_name, export_store, write_archive};

/// Manifest member name; finding it is how the reader roots an archive
pub const MANIFEST_FILE: &str = "export-manifest.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const HIERARCHY_FILE: &str = "hierarchy.json";
pub const CHAT_METAS_FILE: &str = "chat-metas.json";
pub const CHAT_GROUPS_DIR: &str = "chat-groups";
pub const CHAT_CONTENTS_DIR: &str = "chat-contents";
pub const BINARY_OBJECTS_DIR: &str = "binary-objects";
pub const SHARD_INDEX_FILE: &str = "index.json";

/// Fixed leading segment of every export filename
pub const EXPORT_FILE_PREFIX: &str = "weft-export";

/// Hard ceiling on export filename length, in UTF-8 bytes
pub const MAX_FILE_NAME_BYTES: usize = 255;
