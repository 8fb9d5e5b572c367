//! In-memory storage provider
//!
//! Reference implementation of [`StorageProvider`] over plain maps. Used as
//! the test double throughout the backup test suites and as the template
//! for real providers: the dump/restore semantics here are normative.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::binary::{BinaryObject, shard_key};
use crate::chat::{ChatContent, ChatGroup, ChatMeta, HierarchyNode};
use crate::error::Result;
use crate::id::{BinaryObjectId, ChatId, GroupId};
use crate::settings::Settings;
use crate::snapshot::{ContentRecord, Snapshot, StoreStructure, VecContentStream};
use crate::storage::StorageProvider;

#[derive(Debug, Default)]
struct StoreInner {
    settings: Option<Settings>,
    hierarchy: Vec<HierarchyNode>,
    groups: BTreeMap<String, ChatGroup>,
    metas: BTreeMap<String, ChatMeta>,
    contents: BTreeMap<String, ChatContent>,
    binaries: BTreeMap<String, BinaryObject>,
}

/// Thread-safe in-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    clear_calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&self, group: ChatGroup) {
        self.inner
            .lock()
            .groups
            .insert(group.id.as_str().to_string(), group);
    }

    pub fn insert_chat(&self, meta: ChatMeta, content: Option<ChatContent>) {
        let mut inner = self.inner.lock();
        if let Some(content) = content {
            inner
                .contents
                .insert(meta.id.as_str().to_string(), content);
        }
        inner.metas.insert(meta.id.as_str().to_string(), meta);
    }

    pub fn insert_binary(&self, object: BinaryObject) {
        self.inner
            .lock()
            .binaries
            .insert(object.id.as_str().to_string(), object);
    }

    pub fn set_hierarchy(&self, hierarchy: Vec<HierarchyNode>) {
        self.inner.lock().hierarchy = hierarchy;
    }

    pub fn set_settings(&self, settings: Settings) {
        self.inner.lock().settings = Some(settings);
    }

    pub fn get_binary(&self, id: &BinaryObjectId) -> Option<BinaryObject> {
        self.inner.lock().binaries.get(id.as_str()).cloned()
    }

    pub fn get_chat_content(&self, id: &ChatId) -> Option<ChatContent> {
        self.inner.lock().contents.get(id.as_str()).cloned()
    }

    pub fn get_group(&self, id: &GroupId) -> Option<ChatGroup> {
        self.inner.lock().groups.get(id.as_str()).cloned()
    }

    pub fn binary_count(&self) -> usize {
        self.inner.lock().binaries.len()
    }

    pub fn chat_count(&self) -> usize {
        self.inner.lock().metas.len()
    }

    /// How many times `clear_all` has run on this store
    pub fn clear_all_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageProvider for MemoryStore {
    async fn load_settings(&self) -> Result<Option<Settings>> {
        Ok(self.inner.lock().settings.clone())
    }

    async fn update_settings(&self, settings: Settings) -> Result<()> {
        self.inner.lock().settings = Some(settings);
        Ok(())
    }

    async fn list_chats(&self) -> Result<Vec<ChatMeta>> {
        Ok(self.inner.lock().metas.values().cloned().collect())
    }

    async fn list_chat_groups(&self) -> Result<Vec<ChatGroup>> {
        Ok(self.inner.lock().groups.values().cloned().collect())
    }

    async fn load_chat(&self, id: &ChatId) -> Result<Option<ChatContent>> {
        Ok(self.inner.lock().contents.get(id.as_str()).cloned())
    }

    async fn load_hierarchy(&self) -> Result<Vec<HierarchyNode>> {
        Ok(self.inner.lock().hierarchy.clone())
    }

    async fn clear_all(&self) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        *inner = StoreInner::default();
        Ok(())
    }

    async fn dump_without_lock(&self) -> Result<Snapshot> {
        let inner = self.inner.lock();

        let structure = StoreStructure {
            settings: inner.settings.clone(),
            hierarchy: inner.hierarchy.clone(),
            groups: inner.groups.values().cloned().collect(),
            chat_metas: inner.metas.values().cloned().collect(),
        };

        // Chats first, then binaries grouped by shard so the writer can
        // close out one shard index at a time.
        let mut records: Vec<ContentRecord> = inner
            .metas
            .values()
            .filter_map(|meta| {
                inner.contents.get(meta.id.as_str()).map(|content| ContentRecord::Chat {
                    id: meta.id.clone(),
                    content: content.clone(),
                })
            })
            .collect();

        let mut binaries: Vec<&BinaryObject> = inner.binaries.values().collect();
        binaries.sort_by(|a, b| {
            (shard_key(&a.id), a.id.as_str()).cmp(&(shard_key(&b.id), b.id.as_str()))
        });
        records.extend(
            binaries
                .into_iter()
                .map(|object| ContentRecord::Binary(object.clone())),
        );

        Ok(Snapshot::new(
            structure,
            Box::new(VecContentStream::new(records)),
        ))
    }

    async fn restore(&self, mut snapshot: Snapshot) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            inner.hierarchy = snapshot.structure.hierarchy.clone();
            if let Some(settings) = snapshot.structure.settings.clone() {
                inner.settings = Some(settings);
            }
            for group in &snapshot.structure.groups {
                inner
                    .groups
                    .insert(group.id.as_str().to_string(), group.clone());
            }
            for meta in &snapshot.structure.chat_metas {
                inner
                    .metas
                    .insert(meta.id.as_str().to_string(), meta.clone());
            }
        }

        while let Some(record) = snapshot.content.next_record().await? {
            let mut inner = self.inner.lock();
            match record {
                ContentRecord::Chat { id, content } => {
                    inner.contents.insert(id.as_str().to_string(), content);
                }
                ContentRecord::Binary(object) => {
                    inner
                        .binaries
                        .insert(object.id.as_str().to_string(), object);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_dump_orders_binaries_by_shard() {
        let store = MemoryStore::new();
        for id in ["zzB", "aaA", "mmB"] {
            store.insert_binary(BinaryObject {
                id: BinaryObjectId::from(id),
                name: id.to_string(),
                mime_type: "application/octet-stream".to_string(),
                size: 1,
                created_at: Utc::now(),
                data: vec![0],
            });
        }

        let mut snapshot = store.dump_without_lock().await.unwrap();
        let mut shards = Vec::new();
        while let Some(record) = snapshot.content.next_record().await.unwrap() {
            if let ContentRecord::Binary(object) = record {
                shards.push(object.shard());
            }
        }
        assert_eq!(shards, vec!["aa", "mb", "zb"]);
    }

    #[tokio::test]
    async fn test_clear_all_counter() {
        let store = MemoryStore::new();
        assert_eq!(store.clear_all_calls(), 0);
        store.clear_all().await.unwrap();
        assert_eq!(store.clear_all_calls(), 1);
    }
}
