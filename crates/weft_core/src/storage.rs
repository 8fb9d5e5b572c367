//! The Storage Provider seam
//!
//! Everything the backup engine knows about persistence goes through
//! [`StorageProvider`]. The engine never assumes a concrete on-disk layout,
//! and it does not arbitrate concurrent access: locking around
//! `clear_all`/`restore` is the provider's responsibility.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::chat::{ChatContent, ChatGroup, ChatMeta, HierarchyNode};
use crate::error::Result;
use crate::id::ChatId;
use crate::settings::Settings;
use crate::snapshot::Snapshot;

/// Persistence collaborator for the store
///
/// `restore` applies a snapshot: the hierarchy (and settings, when present)
/// replace the stored ones; groups, chat metas, chat contents and binary
/// objects are upserted record by record as the content stream drains.
/// Providers that need clear+restore atomicity must stage internally —
/// this subsystem does not guarantee it.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn load_settings(&self) -> Result<Option<Settings>>;

    async fn update_settings(&self, settings: Settings) -> Result<()>;

    async fn list_chats(&self) -> Result<Vec<ChatMeta>>;

    async fn list_chat_groups(&self) -> Result<Vec<ChatGroup>>;

    async fn load_chat(&self, id: &ChatId) -> Result<Option<ChatContent>>;

    async fn load_hierarchy(&self) -> Result<Vec<HierarchyNode>>;

    /// Wipe every stored record
    async fn clear_all(&self) -> Result<()>;

    /// Snapshot the whole store without taking a write lock
    async fn dump_without_lock(&self) -> Result<Snapshot>;

    /// Apply a snapshot, draining its content stream
    async fn restore(&self, snapshot: Snapshot) -> Result<()>;
}
