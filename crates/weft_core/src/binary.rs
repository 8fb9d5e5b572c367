//! Content-addressed binary object storage primitives
//!
//! Binary objects are bucketed into shard directories keyed by the tail of
//! their id, with a per-shard JSON index mapping id to metadata. The shard
//! rule is part of the archive format: existing exports locate objects with
//! it, so it must never change.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::BinaryObjectId;

/// Derive the shard directory key for a binary object id
///
/// The key is the lowercased last two characters of the id (the whole id
/// when shorter). Bit-exact with every archive ever written.
pub fn shard_key(id: &BinaryObjectId) -> String {
    let chars: Vec<char> = id.as_str().chars().collect();
    let start = chars.len().saturating_sub(2);
    chars[start..].iter().collect::<String>().to_lowercase()
}

/// Metadata for one binary object, as stored in shard indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMeta {
    pub id: BinaryObjectId,
    pub mime_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
}

/// A binary object with its raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryObject {
    pub id: BinaryObjectId,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

impl BinaryObject {
    pub fn meta(&self) -> BinaryMeta {
        BinaryMeta {
            id: self.id.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            created_at: self.created_at,
            name: self.name.clone(),
        }
    }

    pub fn from_meta(meta: BinaryMeta, data: Vec<u8>) -> Self {
        Self {
            id: meta.id,
            name: meta.name,
            mime_type: meta.mime_type,
            size: meta.size,
            created_at: meta.created_at,
            data,
        }
    }

    pub fn shard(&self) -> String {
        shard_key(&self.id)
    }
}

/// The per-shard `index.json` body: object id to metadata
///
/// A BTreeMap keeps emission deterministic across exports of the same store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardIndex {
    pub objects: BTreeMap<String, BinaryMeta>,
}

impl ShardIndex {
    pub fn insert(&mut self, meta: BinaryMeta) {
        self.objects.insert(meta.id.as_str().to_string(), meta);
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_key_is_lowercased_tail() {
        assert_eq!(shard_key(&BinaryObjectId::from("xK93jAb")), "ab");
        assert_eq!(shard_key(&BinaryObjectId::from("idAb")), "ab");
        assert_eq!(shard_key(&BinaryObjectId::from("ZZ")), "zz");
    }

    #[test]
    fn test_shard_key_short_ids() {
        assert_eq!(shard_key(&BinaryObjectId::from("A")), "a");
        assert_eq!(shard_key(&BinaryObjectId::from("")), "");
    }

    #[test]
    fn test_shard_index_wire_shape() {
        let mut index = ShardIndex::default();
        index.insert(BinaryMeta {
            id: BinaryObjectId::from("b1"),
            mime_type: "image/png".to_string(),
            size: 3,
            created_at: chrono::Utc::now(),
            name: "pic.png".to_string(),
        });
        let json = serde_json::to_value(&index).unwrap();
        assert!(json["objects"]["b1"]["mimeType"].is_string());
        assert_eq!(json["objects"]["b1"]["id"], "b1");
    }
}
