//! Weft Core - Store Model and Backup Engine
//!
//! This crate provides the store data model, the Storage Provider seam,
//! and the streaming backup engine (archive export, preview, verify, and
//! Replace/Append import) that powers Weft's portability features.

pub mod backup;
pub mod binary;
pub mod chat;
pub mod config;
pub mod error;
pub mod id;
pub mod settings;
pub mod snapshot;
pub mod storage;

pub use backup::{
    AppendOptions, Archive, ArchiveAnalysis, ArchiveBytes, ArchiveSource, ExportManifest,
    ExportOptions, ExportOutcome, ExportStats, ImportMode, ImportOptions, ImportPhase,
    ImportReport, ImportSession, MergeStrategy, SettingsMergeSpec, VerifyReport,
};
pub use binary::{BinaryMeta, BinaryObject, ShardIndex, shard_key};
pub use chat::{
    Attachment, AttachmentStatus, ChatContent, ChatGroup, ChatMeta, HierarchyNode, MessageNode,
    Role,
};
pub use config::BackupConfig;
pub use error::{CoreError, Result};
pub use id::{AttachmentId, BinaryObjectId, ChatId, GroupId, ProfileId};
pub use settings::{GenerationDefaults, ProviderProfile, Settings, SettingsField, Theme};
pub use snapshot::{ContentRecord, ContentStream, Snapshot, StoreStructure, VecContentStream};
pub use storage::{MemoryStore, StorageProvider};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        AppendOptions, ArchiveAnalysis, ArchiveBytes, ArchiveSource, BinaryObject, BinaryObjectId,
        ChatContent, ChatGroup, ChatId, ChatMeta, ContentRecord, ContentStream, CoreError,
        ExportOptions, GroupId, HierarchyNode, ImportMode, ImportOptions, ImportSession,
        MemoryStore, MergeStrategy, MessageNode, Result, Settings, SettingsMergeSpec, Snapshot,
        StorageProvider, StoreStructure,
    };
}
