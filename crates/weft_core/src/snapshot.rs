//! Snapshots: the unit of transfer between store and archive
//!
//! A snapshot pairs eagerly-loaded structure (small: settings, hierarchy,
//! groups, chat metas) with a forward-only content stream (large: message
//! trees and binary objects). Streams are single-consumption: verify and
//! execute each build their own snapshot, never replay a drained one.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::binary::BinaryObject;
use crate::chat::{ChatContent, ChatGroup, ChatMeta, HierarchyNode};
use crate::error::Result;
use crate::id::ChatId;
use crate::settings::Settings;

/// The eager half of a snapshot
#[derive(Debug, Clone, Default)]
pub struct StoreStructure {
    pub settings: Option<Settings>,
    pub hierarchy: Vec<HierarchyNode>,
    pub groups: Vec<ChatGroup>,
    pub chat_metas: Vec<ChatMeta>,
}

/// One record pulled from a content stream
#[derive(Debug, Clone)]
pub enum ContentRecord {
    Chat { id: ChatId, content: ChatContent },
    Binary(BinaryObject),
}

/// Pull-based cursor over a snapshot's large payloads
///
/// Forward-only and single-consumption: `next_record` yields `Ok(None)`
/// exactly once, after which the stream is exhausted for good.
#[async_trait]
pub trait ContentStream: Send {
    async fn next_record(&mut self) -> Result<Option<ContentRecord>>;
}

/// A store snapshot, scoped to a single export or import operation
pub struct Snapshot {
    pub structure: StoreStructure,
    pub content: Box<dyn ContentStream>,
}

impl Snapshot {
    pub fn new(structure: StoreStructure, content: Box<dyn ContentStream>) -> Self {
        Self { structure, content }
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("structure", &self.structure)
            .field("content", &"<stream>")
            .finish()
    }
}

/// Content stream over pre-materialized records (in-memory stores, tests)
#[derive(Debug, Default)]
pub struct VecContentStream {
    records: VecDeque<ContentRecord>,
}

impl VecContentStream {
    pub fn new(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ContentStream for VecContentStream {
    async fn next_record(&mut self) -> Result<Option<ContentRecord>> {
        Ok(self.records.pop_front())
    }
}
