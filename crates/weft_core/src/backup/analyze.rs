//! Read-only archive analysis
//!
//! Builds the summary shown to the user before an import commits to
//! anything. Per-record parse failures never abort analysis: a malformed
//! group, meta, or hierarchy node is logged, counted, and skipped. Only an
//! unopenable container or a missing manifest is fatal.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backup::reader::{Archive, ArchiveSource};
use crate::backup::types::ExportManifest;
use crate::backup::{
    BINARY_OBJECTS_DIR, CHAT_GROUPS_DIR, CHAT_METAS_FILE, HIERARCHY_FILE, MANIFEST_FILE,
    SETTINGS_FILE,
};
use crate::chat::{ChatGroup, ChatMeta, HierarchyNode};
use crate::error::{CoreError, Result};
use crate::settings::Settings;

/// Everything the preview screen needs, parsed leniently
#[derive(Debug, Clone)]
pub struct ArchiveAnalysis {
    pub manifest: ExportManifest,
    pub settings: Option<Settings>,
    pub profile_count: usize,
    pub groups: Vec<ChatGroup>,
    pub chats: Vec<ChatMeta>,
    pub hierarchy: Vec<HierarchyNode>,
    pub binary_object_count: usize,
    /// Malformed records dropped during parsing
    pub skipped_records: usize,
}

impl ArchiveAnalysis {
    /// True when the archive holds nothing restorable — callers surface a
    /// soft "nothing found" message rather than an error
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty() && self.groups.is_empty() && self.binary_object_count == 0
    }
}

/// Summarize an archive without touching the live store
pub fn analyze(source: &dyn ArchiveSource) -> Result<ArchiveAnalysis> {
    let mut archive = Archive::open(source)?;

    let manifest: ExportManifest = match archive.read_json(MANIFEST_FILE) {
        Ok(manifest) => manifest,
        // An unparseable manifest is as fatal as an absent one
        Err(CoreError::MalformedRecord { .. }) => return Err(CoreError::ManifestNotFound),
        Err(e) => return Err(e),
    };

    let parsed = parse_structure(&mut archive)?;
    let binary_object_count = count_binary_members(&archive);

    Ok(ArchiveAnalysis {
        manifest,
        profile_count: parsed
            .settings
            .as_ref()
            .map(|s| s.provider_profiles.len())
            .unwrap_or(0),
        settings: parsed.settings,
        groups: parsed.groups,
        chats: parsed.metas,
        hierarchy: parsed.hierarchy,
        binary_object_count,
        skipped_records: parsed.skipped,
    })
}

/// Count `.bin` members across shard directories, excluding dot-markers
pub(crate) fn count_binary_members(archive: &Archive) -> usize {
    archive
        .member_names_under(BINARY_OBJECTS_DIR)
        .iter()
        .filter(|name| {
            let base = name.rsplit('/').next().unwrap_or(name);
            base.ends_with(".bin") && !base.starts_with('.')
        })
        .count()
}

/// Archive structure parsed with per-record fault tolerance
#[derive(Debug, Default)]
pub(crate) struct ParsedStructure {
    pub settings: Option<Settings>,
    pub groups: Vec<ChatGroup>,
    pub metas: Vec<ChatMeta>,
    pub hierarchy: Vec<HierarchyNode>,
    pub skipped: usize,
}

fn parse_lenient<T: DeserializeOwned>(path: &str, bytes: &[u8], skipped: &mut usize) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%path, %error, "skipping malformed archive record");
            *skipped += 1;
            None
        }
    }
}

fn parse_value_lenient<T: DeserializeOwned>(
    path: &str,
    value: serde_json::Value,
    skipped: &mut usize,
) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%path, %error, "skipping malformed archive record");
            *skipped += 1;
            None
        }
    }
}

/// Parse settings, groups, metas and hierarchy from an opened archive
///
/// Shared by the analyzer and both import planners so preview and import
/// always agree on what an archive contains.
pub(crate) fn parse_structure(archive: &mut Archive) -> Result<ParsedStructure> {
    let mut parsed = ParsedStructure::default();

    // Settings: optional file, and not worth failing an import over
    if let Some(bytes) = archive.read_optional_bytes(SETTINGS_FILE)? {
        parsed.settings = parse_lenient(SETTINGS_FILE, &bytes, &mut parsed.skipped);
    }

    let group_members: Vec<String> = archive
        .member_names_under(CHAT_GROUPS_DIR)
        .into_iter()
        .filter(|name| name.ends_with(".json"))
        .collect();
    for member in group_members {
        let Some(bytes) = archive.read_optional_bytes(&member)? else {
            continue;
        };
        if let Some(group) = parse_lenient::<ChatGroup>(&member, &bytes, &mut parsed.skipped) {
            parsed.groups.push(group);
        }
    }

    if let Some(bytes) = archive.read_optional_bytes(CHAT_METAS_FILE)? {
        let entries = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|mut value| value.get_mut("entries").map(serde_json::Value::take))
            .and_then(|entries| match entries {
                serde_json::Value::Array(entries) => Some(entries),
                _ => None,
            });
        match entries {
            Some(entries) => {
                for entry in entries {
                    if let Some(meta) =
                        parse_value_lenient::<ChatMeta>(CHAT_METAS_FILE, entry, &mut parsed.skipped)
                    {
                        parsed.metas.push(meta);
                    }
                }
            }
            None => {
                warn!(path = CHAT_METAS_FILE, "chat meta list is malformed, ignoring it");
                parsed.skipped += 1;
            }
        }
    }

    parsed.hierarchy = load_hierarchy(archive, &parsed.groups, &parsed.metas, &mut parsed.skipped)?;

    Ok(parsed)
}

/// Reconstruct the display hierarchy
///
/// The explicit `hierarchy.json` wins when present and parseable (bad nodes
/// dropped one by one); otherwise membership falls back to each chat meta's
/// legacy `groupId`, with ungrouped chats appended in encounter order.
fn load_hierarchy(
    archive: &mut Archive,
    groups: &[ChatGroup],
    metas: &[ChatMeta],
    skipped: &mut usize,
) -> Result<Vec<HierarchyNode>> {
    if let Some(bytes) = archive.read_optional_bytes(HIERARCHY_FILE)? {
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(mut value) => {
                if let Some(serde_json::Value::Array(items)) =
                    value.get_mut("items").map(serde_json::Value::take)
                {
                    let mut nodes = Vec::with_capacity(items.len());
                    for item in items {
                        if let Some(node) =
                            parse_value_lenient::<HierarchyNode>(HIERARCHY_FILE, item, skipped)
                        {
                            nodes.push(node);
                        }
                    }
                    return Ok(resolve_references(nodes, groups, metas, skipped));
                }
                warn!(
                    path = HIERARCHY_FILE,
                    "hierarchy file has no item list, falling back to legacy group membership"
                );
            }
            Err(error) => {
                warn!(
                    path = HIERARCHY_FILE,
                    %error,
                    "hierarchy file is malformed, falling back to legacy group membership"
                );
            }
        }
    }
    Ok(legacy_hierarchy(groups, metas))
}

/// Drop hierarchy nodes (and group members) that point at missing records
fn resolve_references(
    nodes: Vec<HierarchyNode>,
    groups: &[ChatGroup],
    metas: &[ChatMeta],
    skipped: &mut usize,
) -> Vec<HierarchyNode> {
    let group_ids: HashSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    let chat_ids: HashSet<&str> = metas.iter().map(|m| m.id.as_str()).collect();

    nodes
        .into_iter()
        .filter_map(|node| match node {
            HierarchyNode::Chat { id } => {
                if chat_ids.contains(id.as_str()) {
                    Some(HierarchyNode::Chat { id })
                } else {
                    warn!(chat = %id, "dropping hierarchy entry for unknown chat");
                    *skipped += 1;
                    None
                }
            }
            HierarchyNode::ChatGroup { id, chat_ids: members } => {
                if !group_ids.contains(id.as_str()) {
                    warn!(group = %id, "dropping hierarchy entry for unknown group");
                    *skipped += 1;
                    return None;
                }
                let members = members
                    .into_iter()
                    .filter(|member| {
                        let known = chat_ids.contains(member.as_str());
                        if !known {
                            debug!(group = %id, chat = %member, "dropping unknown group member");
                        }
                        known
                    })
                    .collect();
                Some(HierarchyNode::ChatGroup { id, chat_ids: members })
            }
        })
        .collect()
}

/// Legacy assembly: groups (with their member chats) then ungrouped chats
fn legacy_hierarchy(groups: &[ChatGroup], metas: &[ChatMeta]) -> Vec<HierarchyNode> {
    let group_ids: HashSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();

    let mut nodes: Vec<HierarchyNode> = groups
        .iter()
        .map(|group| HierarchyNode::ChatGroup {
            id: group.id.clone(),
            chat_ids: metas
                .iter()
                .filter(|meta| meta.group_id.as_ref() == Some(&group.id))
                .map(|meta| meta.id.clone())
                .collect(),
        })
        .collect();

    nodes.extend(
        metas
            .iter()
            .filter(|meta| {
                meta.group_id
                    .as_ref()
                    .is_none_or(|g| !group_ids.contains(g.as_str()))
            })
            .map(|meta| HierarchyNode::Chat {
                id: meta.id.clone(),
            }),
    );

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ChatId, GroupId};
    use chrono::Utc;

    fn meta(id: &str, group: Option<&str>) -> ChatMeta {
        ChatMeta {
            id: ChatId::from(id),
            title: id.to_string(),
            updated_at: Utc::now(),
            group_id: group.map(GroupId::from),
        }
    }

    fn group(id: &str) -> ChatGroup {
        ChatGroup {
            id: GroupId::from(id),
            name: id.to_string(),
            collapsed: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_legacy_hierarchy_orders_groups_then_chats() {
        let groups = vec![group("g1")];
        let metas = vec![meta("c1", Some("g1")), meta("c2", None), meta("c3", Some("gone"))];

        let nodes = legacy_hierarchy(&groups, &metas);
        assert_eq!(nodes.len(), 3);
        match &nodes[0] {
            HierarchyNode::ChatGroup { id, chat_ids } => {
                assert_eq!(id.as_str(), "g1");
                assert_eq!(chat_ids, &vec![ChatId::from("c1")]);
            }
            _ => panic!("expected group first"),
        }
        assert_eq!(nodes[1], HierarchyNode::Chat { id: ChatId::from("c2") });
        // A meta pointing at a missing group counts as ungrouped
        assert_eq!(nodes[2], HierarchyNode::Chat { id: ChatId::from("c3") });
    }

    #[test]
    fn test_unresolvable_nodes_are_dropped() {
        let groups = vec![group("g1")];
        let metas = vec![meta("c1", None)];
        let mut skipped = 0;

        let nodes = resolve_references(
            vec![
                HierarchyNode::Chat { id: ChatId::from("c1") },
                HierarchyNode::Chat { id: ChatId::from("ghost") },
                HierarchyNode::ChatGroup {
                    id: GroupId::from("g1"),
                    chat_ids: vec![ChatId::from("c1"), ChatId::from("ghost")],
                },
            ],
            &groups,
            &metas,
            &mut skipped,
        );

        assert_eq!(nodes.len(), 2);
        assert_eq!(skipped, 1);
        match &nodes[1] {
            HierarchyNode::ChatGroup { chat_ids, .. } => {
                assert_eq!(chat_ids, &vec![ChatId::from("c1")])
            }
            _ => panic!("expected group node"),
        }
    }
}
