//! Replace import planner
//!
//! A verbatim, schema-checked translation of the archive: identifiers pass
//! through untouched. The caller wipes the store before restoring, so
//! nothing here needs to avoid collisions — it only needs to be faithful.

use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::backup::analyze::parse_structure;
use crate::backup::reader::{Archive, ArchiveSource};
use crate::backup::{BINARY_OBJECTS_DIR, CHAT_CONTENTS_DIR, SHARD_INDEX_FILE};
use crate::binary::{BinaryMeta, BinaryObject, ShardIndex, shard_key};
use crate::chat::ChatContent;
use crate::error::Result;
use crate::id::{BinaryObjectId, ChatId};
use crate::snapshot::{ContentRecord, ContentStream, Snapshot, StoreStructure};

pub(crate) fn binary_member(id: &BinaryObjectId) -> String {
    format!("{BINARY_OBJECTS_DIR}/{}/{id}.bin", shard_key(id))
}

pub(crate) fn marker_member(id: &BinaryObjectId) -> String {
    format!("{BINARY_OBJECTS_DIR}/{}/.{id}.bin.complete", shard_key(id))
}

/// Union of every shard's `index.json`, in shard order
///
/// A malformed index drops that shard's metadata with a warning; its
/// objects become unreachable the same way they would be for a reader
/// following the on-disk layout.
pub(crate) fn shard_index_union(archive: &mut Archive) -> Result<Vec<BinaryMeta>> {
    let index_members: Vec<String> = archive
        .member_names_under(BINARY_OBJECTS_DIR)
        .into_iter()
        .filter(|name| name.ends_with(&format!("/{SHARD_INDEX_FILE}")))
        .collect();

    let mut metas = Vec::new();
    for member in index_members {
        let Some(bytes) = archive.read_optional_bytes(&member)? else {
            continue;
        };
        match serde_json::from_slice::<ShardIndex>(&bytes) {
            Ok(index) => metas.extend(index.objects.into_values()),
            Err(error) => {
                warn!(path = %member, %error, "skipping malformed shard index");
            }
        }
    }
    Ok(metas)
}

/// Content cursor over the archive: chat trees first, then binaries
struct ReplaceContentStream {
    archive: Archive,
    chats: VecDeque<ChatId>,
    binaries: VecDeque<BinaryMeta>,
}

impl ReplaceContentStream {
    fn next_chat(&mut self) -> Result<Option<ContentRecord>> {
        while let Some(id) = self.chats.pop_front() {
            let member = format!("{CHAT_CONTENTS_DIR}/{id}.json");
            match self.archive.read_optional_json::<ChatContent>(&member)? {
                Some(content) => return Ok(Some(ContentRecord::Chat { id, content })),
                None => {
                    // A meta without a content file is dropped, not an error
                    debug!(chat = %id, "no content file for chat meta, dropping");
                }
            }
        }
        Ok(None)
    }

    fn next_binary(&mut self) -> Result<Option<ContentRecord>> {
        while let Some(meta) = self.binaries.pop_front() {
            if !self.archive.has_member(&marker_member(&meta.id)) {
                warn!(id = %meta.id, "binary object has no completion marker, skipping partial write");
                continue;
            }
            let data = self.archive.read_bytes(&binary_member(&meta.id))?;
            return Ok(Some(ContentRecord::Binary(BinaryObject::from_meta(
                meta, data,
            ))));
        }
        Ok(None)
    }
}

#[async_trait]
impl ContentStream for ReplaceContentStream {
    async fn next_record(&mut self) -> Result<Option<ContentRecord>> {
        if let Some(record) = self.next_chat()? {
            return Ok(Some(record));
        }
        self.next_binary()
    }
}

/// Build a Replace-mode snapshot from an archive
pub fn plan_replace(source: &dyn ArchiveSource) -> Result<Snapshot> {
    let mut archive = Archive::open(source)?;
    let parsed = parse_structure(&mut archive)?;
    let binaries = shard_index_union(&mut archive)?;

    let chats: VecDeque<ChatId> = parsed.metas.iter().map(|meta| meta.id.clone()).collect();

    let structure = StoreStructure {
        settings: parsed.settings,
        hierarchy: parsed.hierarchy,
        groups: parsed.groups,
        chat_metas: parsed.metas,
    };

    Ok(Snapshot::new(
        structure,
        Box::new(ReplaceContentStream {
            archive,
            chats,
            binaries: binaries.into(),
        }),
    ))
}
