//! Export → import round-trip coverage against the in-memory provider

use std::io::{Cursor, Write};

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use weft_core::prelude::*;
use weft_core::{
    Attachment, AttachmentId, AttachmentStatus, ChatMeta, ProviderProfile, ProfileId, Role, Theme,
    backup::{export_store, ImportPhase},
};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn message(id: &str, role: Role, secs: i64) -> MessageNode {
    MessageNode {
        id: id.to_string(),
        role,
        content: format!("body of {id}"),
        timestamp: ts(secs),
        model_id: None,
        thinking: None,
        error: None,
        attachments: Vec::new(),
        replies: Vec::new(),
    }
}

fn attachment(id: &str, binary: &str) -> Attachment {
    Attachment {
        id: AttachmentId::from(id),
        binary_object_id: BinaryObjectId::from(binary),
        mime_type: "image/png".to_string(),
        size: 3,
        name: "pic.png".to_string(),
        status: AttachmentStatus::Ready,
    }
}

fn binary(id: &str, data: &[u8]) -> BinaryObject {
    BinaryObject {
        id: BinaryObjectId::from(id),
        name: format!("{id}.bin"),
        mime_type: "image/png".to_string(),
        size: data.len() as u64,
        created_at: ts(50),
        data: data.to_vec(),
    }
}

/// Two chats, one group, two binaries — one of them shared by two chats
fn sample_store() -> MemoryStore {
    let store = MemoryStore::new();

    store.set_settings(Settings {
        theme: Theme::Dark,
        language: Some("en".to_string()),
        provider_profiles: vec![
            ProviderProfile {
                id: ProfileId::from("p1"),
                name: "local".to_string(),
                base_url: Some("http://localhost:8080/v1".to_string()),
                model_id: None,
                api_key: None,
            },
            ProviderProfile {
                id: ProfileId::from("p2"),
                name: "cloud".to_string(),
                base_url: None,
                model_id: Some("big-model".to_string()),
                api_key: Some("sk-test".to_string()),
            },
        ],
        ..Default::default()
    });

    store.insert_group(ChatGroup {
        id: GroupId::from("g1"),
        name: "Research".to_string(),
        collapsed: false,
        updated_at: ts(100),
    });

    let mut m2 = message("m2", Role::Assistant, 120);
    m2.attachments.push(attachment("a1", "imgAb"));
    let mut root1 = message("m1", Role::User, 110);
    root1.replies = vec![m2, message("m3", Role::Assistant, 130)];
    store.insert_chat(
        ChatMeta {
            id: ChatId::from("c1"),
            title: "Sharded storage".to_string(),
            updated_at: ts(130),
            group_id: Some(GroupId::from("g1")),
        },
        Some(ChatContent {
            root: root1,
            current_leaf_id: Some("m2".to_string()),
        }),
    );

    let mut root2 = message("m4", Role::User, 200);
    root2.attachments = vec![attachment("a2", "imgAb"), attachment("a3", "docQq")];
    store.insert_chat(
        ChatMeta {
            id: ChatId::from("c2"),
            title: "Loose ends".to_string(),
            updated_at: ts(200),
            group_id: None,
        },
        Some(ChatContent {
            root: root2,
            current_leaf_id: None,
        }),
    );

    store.insert_binary(binary("imgAb", &[1, 2, 3]));
    store.insert_binary(binary("docQq", b"doc"));

    store.set_hierarchy(vec![
        HierarchyNode::ChatGroup {
            id: GroupId::from("g1"),
            chat_ids: vec![ChatId::from("c1")],
        },
        HierarchyNode::Chat {
            id: ChatId::from("c2"),
        },
    ]);

    store
}

async fn export_bytes(store: &MemoryStore) -> (Vec<u8>, weft_core::ExportOutcome) {
    let mut buf = Vec::new();
    let outcome = export_store(store, &ExportOptions::default(), Cursor::new(&mut buf))
        .await
        .unwrap();
    (buf, outcome)
}

#[tokio::test]
async fn test_export_layout_and_stats() {
    let store = sample_store();
    let (bytes, outcome) = export_bytes(&store).await;

    assert!(outcome.file_name.starts_with("weft-export-"));
    assert!(outcome.file_name.ends_with(".zip"));
    assert_eq!(outcome.stats.chats, 2);
    assert_eq!(outcome.stats.groups, 1);
    assert_eq!(outcome.stats.binary_objects, 2);

    let stem = outcome.file_name.trim_end_matches(".zip");
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();

    for expected in [
        format!("{stem}/export-manifest.json"),
        format!("{stem}/settings.json"),
        format!("{stem}/hierarchy.json"),
        format!("{stem}/chat-groups/g1.json"),
        format!("{stem}/chat-metas.json"),
        format!("{stem}/chat-contents/c1.json"),
        format!("{stem}/chat-contents/c2.json"),
        format!("{stem}/binary-objects/ab/imgAb.bin"),
        format!("{stem}/binary-objects/ab/.imgAb.bin.complete"),
        format!("{stem}/binary-objects/ab/index.json"),
        format!("{stem}/binary-objects/qq/docQq.bin"),
        format!("{stem}/binary-objects/qq/index.json"),
    ] {
        assert!(names.contains(&expected), "missing member {expected}");
    }

    // Markers are zero-byte
    let marker = zip
        .by_name(&format!("{stem}/binary-objects/ab/.imgAb.bin.complete"))
        .unwrap();
    assert_eq!(marker.size(), 0);
}

#[tokio::test]
async fn test_analyze_summarizes_archive() {
    let store = sample_store();
    let (bytes, _) = export_bytes(&store).await;

    let mut session = ImportSession::new(ArchiveBytes::from(bytes));
    let analysis = session.analyze().await.unwrap();

    assert_eq!(analysis.chats.len(), 2);
    assert_eq!(analysis.groups.len(), 1);
    assert_eq!(analysis.binary_object_count, 2);
    assert_eq!(analysis.profile_count, 2);
    assert_eq!(analysis.hierarchy.len(), 2);
    assert_eq!(analysis.skipped_records, 0);
    assert!(!analysis.is_empty());
    assert_eq!(session.phase(), ImportPhase::Previewed);
}

#[tokio::test]
async fn test_replace_roundtrip_reproduces_store() {
    let source = sample_store();
    let (bytes, _) = export_bytes(&source).await;

    let target = MemoryStore::new();
    let mut session = ImportSession::new(ArchiveBytes::from(bytes));
    session.analyze().await.unwrap();
    session.verify().await.unwrap();

    let options = ImportOptions {
        settings: SettingsMergeSpec::replace_all(),
        ..ImportOptions::replace()
    };
    let report = session.execute(&target, &options).await.unwrap();

    assert_eq!(report.chats, 2);
    assert_eq!(report.groups, 1);
    assert_eq!(target.clear_all_calls(), 1);
    assert_eq!(session.phase(), ImportPhase::Committed);

    // Identifiers are untouched in replace mode, so records compare directly
    assert_eq!(
        target.load_hierarchy().await.unwrap(),
        source.load_hierarchy().await.unwrap()
    );
    assert_eq!(
        target.load_settings().await.unwrap(),
        source.load_settings().await.unwrap()
    );
    assert_eq!(
        target.get_chat_content(&ChatId::from("c1")),
        source.get_chat_content(&ChatId::from("c1"))
    );
    assert_eq!(
        target
            .get_binary(&BinaryObjectId::from("imgAb"))
            .map(|object| object.data),
        Some(vec![1, 2, 3])
    );
    assert_eq!(
        target
            .get_binary(&BinaryObjectId::from("docQq"))
            .map(|object| object.data),
        Some(b"doc".to_vec())
    );
}

#[tokio::test]
async fn test_verify_fails_before_clear_all_can_run() {
    // A valid meta pointing at a corrupt content file: analysis is fine,
    // verification is not, and the destructive path must stay closed.
    let mut cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut cursor);
    let options = SimpleFileOptions::default();
    let entries = [
        (
            "backup/export-manifest.json",
            r#"{"app_version":"0.2.0","exportedAt":"2026-01-01T00:00:00Z"}"#,
        ),
        (
            "backup/chat-metas.json",
            r#"{"entries":[{"id":"c1","title":"Broken","updatedAt":"2026-01-01T00:00:00Z"}]}"#,
        ),
        ("backup/chat-contents/c1.json", "{ this is not json"),
    ];
    for (name, body) in entries {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();

    let target = sample_store();
    let mut session = ImportSession::new(ArchiveBytes::from(cursor.into_inner()));

    session.analyze().await.unwrap();
    let error = session.verify().await.unwrap_err();
    assert!(matches!(error, CoreError::MalformedRecord { .. }));
    assert_eq!(session.phase(), ImportPhase::VerifyFailed);

    let error = session
        .execute(&target, &ImportOptions::replace())
        .await
        .unwrap_err();
    assert!(matches!(error, CoreError::InvalidImportState { .. }));

    // The store was never wiped
    assert_eq!(target.clear_all_calls(), 0);
    assert_eq!(target.chat_count(), 2);
}

#[tokio::test]
async fn test_replace_without_verify_is_rejected() {
    let store = sample_store();
    let (bytes, _) = export_bytes(&store).await;

    let target = MemoryStore::new();
    let mut session = ImportSession::new(ArchiveBytes::from(bytes));
    session.analyze().await.unwrap();

    let error = session
        .execute(&target, &ImportOptions::replace())
        .await
        .unwrap_err();
    assert!(matches!(error, CoreError::InvalidImportState { .. }));
    assert_eq!(target.clear_all_calls(), 0);
}

#[tokio::test]
async fn test_verify_requires_analysis_first() {
    let store = sample_store();
    let (bytes, _) = export_bytes(&store).await;

    let mut session = ImportSession::new(ArchiveBytes::from(bytes));
    let error = session.verify().await.unwrap_err();
    assert!(matches!(error, CoreError::InvalidImportState { .. }));
}
