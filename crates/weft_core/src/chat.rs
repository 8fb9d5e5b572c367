//! Chats, groups, the display hierarchy, and message trees
//!
//! Message history is a tree: each node owns its replies by value, and a
//! chat tracks the active branch with `current_leaf_id`. Traversal is
//! pre-order throughout, which keeps lookup and append-mode rewriting on
//! the same path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AttachmentId, BinaryObjectId, ChatId, GroupId};

/// Author of a message node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Upload/processing state of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    #[default]
    Ready,
    Pending,
    Missing,
}

/// A file attached to a message, pointing at a shared binary object
///
/// `name` is defaulted on deserialization: old exports predate the field,
/// and append-mode import normalizes the empty value away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub binary_object_id: BinaryObjectId,
    pub mime_type: String,
    pub size: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: AttachmentStatus,
}

impl Attachment {
    /// Fill the legacy missing-name shape with a mime-derived placeholder
    pub fn normalize_legacy_name(&mut self) {
        if self.name.is_empty() {
            self.name = match self.mime_type.split_once('/') {
                Some((_, subtype)) if !subtype.is_empty() => format!("attachment.{subtype}"),
                _ => "attachment".to_string(),
            };
        }
    }
}

/// One node of a chat's message tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNode {
    /// Unique within the chat's whole tree
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<MessageNode>,
}

impl MessageNode {
    /// Pre-order search for a node by id
    pub fn find(&self, id: &str) -> Option<&MessageNode> {
        if self.id == id {
            return Some(self);
        }
        self.replies.iter().find_map(|child| child.find(id))
    }

    /// Pre-order visit of every node
    pub fn walk(&self, visit: &mut impl FnMut(&MessageNode)) {
        visit(self);
        for child in &self.replies {
            child.walk(visit);
        }
    }

    /// Pre-order mutable visit of every node
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut MessageNode)) {
        visit(self);
        for child in &mut self.replies {
            child.walk_mut(visit);
        }
    }
}

/// A chat's full message history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContent {
    pub root: MessageNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_leaf_id: Option<String>,
}

impl ChatContent {
    /// Resolve the active branch tip
    ///
    /// `current_leaf_id` wins when it resolves by descent from the root;
    /// a stale pointer falls back to the latest node in the tree.
    pub fn resolve_current_leaf(&self) -> &MessageNode {
        if let Some(id) = &self.current_leaf_id {
            if let Some(node) = self.root.find(id) {
                return node;
            }
        }
        fn latest_of<'a>(node: &'a MessageNode, best: &'a MessageNode) -> &'a MessageNode {
            let mut best = if node.timestamp >= best.timestamp { node } else { best };
            for child in &node.replies {
                best = latest_of(child, best);
            }
            best
        }
        latest_of(&self.root, &self.root)
    }
}

/// A user-defined folder of chats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub collapsed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Chat metadata, kept separate from the (large) message tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMeta {
    pub id: ChatId,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    /// Legacy group membership, used only when no explicit hierarchy exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

/// One entry of the ordered display hierarchy
///
/// Order defines top-level display order; `chat_ids` defines order within
/// a group. Every referenced id must resolve to an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HierarchyNode {
    Chat {
        id: ChatId,
    },
    ChatGroup {
        id: GroupId,
        #[serde(default)]
        chat_ids: Vec<ChatId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn node(id: &str, ts: i64, replies: Vec<MessageNode>) -> MessageNode {
        MessageNode {
            id: id.to_string(),
            role: Role::User,
            content: format!("message {id}"),
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            model_id: None,
            thinking: None,
            error: None,
            attachments: Vec::new(),
            replies,
        }
    }

    #[test]
    fn test_current_leaf_resolves_by_descent() {
        let content = ChatContent {
            root: node("a", 1, vec![node("b", 2, vec![]), node("c", 3, vec![])]),
            current_leaf_id: Some("b".to_string()),
        };
        assert_eq!(content.resolve_current_leaf().id, "b");
    }

    #[test]
    fn test_stale_leaf_falls_back_to_latest() {
        let content = ChatContent {
            root: node("a", 1, vec![node("b", 5, vec![]), node("c", 3, vec![])]),
            current_leaf_id: Some("gone".to_string()),
        };
        assert_eq!(content.resolve_current_leaf().id, "b");
    }

    #[test]
    fn test_hierarchy_node_wire_shape() {
        let items: Vec<HierarchyNode> = serde_json::from_str(
            r#"[{"type":"chat","id":"c1"},{"type":"chat_group","id":"g1","chat_ids":["c2","c3"]}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        match &items[1] {
            HierarchyNode::ChatGroup { id, chat_ids } => {
                assert_eq!(id.as_str(), "g1");
                assert_eq!(chat_ids.len(), 2);
            }
            _ => panic!("expected group node"),
        }

        let json = serde_json::to_string(&items[0]).unwrap();
        assert_eq!(json, r#"{"type":"chat","id":"c1"}"#);
    }

    #[test]
    fn test_legacy_attachment_normalization() {
        let mut attachment: Attachment = serde_json::from_str(
            r#"{"id":"a1","binaryObjectId":"b1","mimeType":"image/png","size":10}"#,
        )
        .unwrap();
        assert!(attachment.name.is_empty());
        attachment.normalize_legacy_name();
        assert_eq!(attachment.name, "attachment.png");
    }
}
