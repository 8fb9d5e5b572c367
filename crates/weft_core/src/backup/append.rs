//! Append import planner
//!
//! Merges an archive into a non-empty store. Every chat, group and binary
//! object gets a freshly generated id; every reference (hierarchy entries,
//! group member lists, attachment pointers) is rewritten through one
//! request-scoped remap table, so shared binaries stay shared and nothing
//! collides with what the store already holds.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::backup::analyze::parse_structure;
use crate::backup::reader::{Archive, ArchiveSource};
use crate::backup::replace::{binary_member, marker_member, shard_index_union};
use crate::backup::CHAT_CONTENTS_DIR;
use crate::binary::{BinaryMeta, BinaryObject};
use crate::chat::{ChatContent, ChatGroup, ChatMeta, HierarchyNode};
use crate::error::Result;
use crate::id::{AttachmentId, BinaryObjectId, ChatId, GroupId};
use crate::snapshot::{ContentRecord, ContentStream, Snapshot, StoreStructure};

/// Naming applied to append-imported records
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Prepended verbatim to every imported chat title
    pub chat_title_prefix: Option<String>,
    /// Prepended verbatim to every imported group name
    pub group_name_prefix: Option<String>,
}

fn apply_prefix(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{name}"),
        _ => name.to_string(),
    }
}

/// Old-id to new-id tables, scoped to a single append operation
///
/// Entries are minted lazily; asking twice for the same original id always
/// returns the same fresh id, which is what keeps shared binary references
/// shared after the rewrite.
#[derive(Debug, Default)]
struct RemapContext {
    chats: HashMap<String, ChatId>,
    groups: HashMap<String, GroupId>,
    binaries: HashMap<String, BinaryObjectId>,
}

impl RemapContext {
    fn chat(&mut self, old: &ChatId) -> ChatId {
        self.chats
            .entry(old.as_str().to_string())
            .or_insert_with(ChatId::generate)
            .clone()
    }

    fn group(&mut self, old: &GroupId) -> GroupId {
        self.groups
            .entry(old.as_str().to_string())
            .or_insert_with(GroupId::generate)
            .clone()
    }

    fn binary(&mut self, old: &BinaryObjectId) -> BinaryObjectId {
        self.binaries
            .entry(old.as_str().to_string())
            .or_insert_with(BinaryObjectId::generate)
            .clone()
    }

    fn chat_if_imported(&self, old: &ChatId) -> Option<ChatId> {
        self.chats.get(old.as_str()).cloned()
    }

    fn group_if_imported(&self, old: &GroupId) -> Option<GroupId> {
        self.groups.get(old.as_str()).cloned()
    }

    fn binary_if_referenced(&self, old: &BinaryObjectId) -> Option<BinaryObjectId> {
        self.binaries.get(old.as_str()).cloned()
    }
}

/// Content cursor that rewrites identifiers while it streams
///
/// Chats drain before binaries, so by the time the binary phase starts the
/// remap table knows every referenced object — everything else in the shard
/// indexes is an orphan and is not emitted.
struct AppendContentStream {
    archive: Archive,
    chats: VecDeque<(ChatId, ChatId)>,
    binaries: VecDeque<BinaryMeta>,
    ctx: RemapContext,
}

impl AppendContentStream {
    fn rewrite_attachments(&mut self, content: &mut ChatContent) {
        let ctx = &mut self.ctx;
        content.root.walk_mut(&mut |node| {
            for attachment in &mut node.attachments {
                attachment.id = AttachmentId::generate();
                attachment.binary_object_id = ctx.binary(&attachment.binary_object_id);
                attachment.normalize_legacy_name();
            }
        });
    }

    fn next_chat(&mut self) -> Result<Option<ContentRecord>> {
        while let Some((old, new)) = self.chats.pop_front() {
            let member = format!("{CHAT_CONTENTS_DIR}/{old}.json");
            match self.archive.read_optional_json::<ChatContent>(&member)? {
                Some(mut content) => {
                    self.rewrite_attachments(&mut content);
                    return Ok(Some(ContentRecord::Chat {
                        id: new,
                        content,
                    }));
                }
                None => {
                    debug!(chat = %old, "no content file for chat meta, dropping");
                }
            }
        }
        Ok(None)
    }

    fn next_binary(&mut self) -> Result<Option<ContentRecord>> {
        while let Some(meta) = self.binaries.pop_front() {
            let Some(new_id) = self.ctx.binary_if_referenced(&meta.id) else {
                debug!(id = %meta.id, "indexed binary is unreferenced, excluding orphan");
                continue;
            };
            if !self.archive.has_member(&marker_member(&meta.id)) {
                warn!(id = %meta.id, "binary object has no completion marker, skipping partial write");
                continue;
            }
            let data = self.archive.read_bytes(&binary_member(&meta.id))?;
            return Ok(Some(ContentRecord::Binary(BinaryObject {
                id: new_id,
                name: meta.name,
                mime_type: meta.mime_type,
                size: meta.size,
                created_at: meta.created_at,
                data,
            })));
        }
        Ok(None)
    }
}

#[async_trait]
impl ContentStream for AppendContentStream {
    async fn next_record(&mut self) -> Result<Option<ContentRecord>> {
        if let Some(record) = self.next_chat()? {
            return Ok(Some(record));
        }
        self.next_binary()
    }
}

/// Build an Append-mode snapshot from an archive
///
/// `current_hierarchy` is the store's hierarchy as of planning; imported
/// nodes are appended after it, both sides keeping their relative order.
/// `structure.settings` carries the archive's settings verbatim — callers
/// decide what to keep via the settings merger before restoring.
pub fn plan_append(
    source: &dyn ArchiveSource,
    current_hierarchy: Vec<HierarchyNode>,
    options: &AppendOptions,
) -> Result<Snapshot> {
    let mut archive = Archive::open(source)?;
    let parsed = parse_structure(&mut archive)?;
    let mut ctx = RemapContext::default();

    let groups: Vec<ChatGroup> = parsed
        .groups
        .iter()
        .map(|group| ChatGroup {
            id: ctx.group(&group.id),
            name: apply_prefix(options.group_name_prefix.as_deref(), &group.name),
            collapsed: group.collapsed,
            updated_at: group.updated_at,
        })
        .collect();

    let metas: Vec<ChatMeta> = parsed
        .metas
        .iter()
        .map(|meta| ChatMeta {
            id: ctx.chat(&meta.id),
            title: apply_prefix(options.chat_title_prefix.as_deref(), &meta.title),
            updated_at: meta.updated_at,
            group_id: meta
                .group_id
                .as_ref()
                .and_then(|group| ctx.group_if_imported(group)),
        })
        .collect();

    // parse_structure already resolved explicit-vs-legacy: either way the
    // parsed hierarchy is the imported ordering, ready to rewrite.
    let imported_nodes = parsed.hierarchy.iter().filter_map(|node| match node {
        HierarchyNode::Chat { id } => ctx
            .chat_if_imported(id)
            .map(|id| HierarchyNode::Chat { id }),
        HierarchyNode::ChatGroup { id, chat_ids } => {
            ctx.group_if_imported(id).map(|id| HierarchyNode::ChatGroup {
                id,
                chat_ids: chat_ids
                    .iter()
                    .filter_map(|chat| ctx.chat_if_imported(chat))
                    .collect(),
            })
        }
    });

    let mut hierarchy = current_hierarchy;
    hierarchy.extend(imported_nodes);

    let chats: VecDeque<(ChatId, ChatId)> = parsed
        .metas
        .iter()
        .map(|meta| (meta.id.clone(), ctx.chat(&meta.id)))
        .collect();

    let binaries = shard_index_union(&mut archive)?;

    let structure = StoreStructure {
        settings: parsed.settings,
        hierarchy,
        groups,
        chat_metas: metas,
    };

    Ok(Snapshot::new(
        structure,
        Box::new(AppendContentStream {
            archive,
            chats,
            binaries: binaries.into(),
            ctx,
        }),
    ))
}
