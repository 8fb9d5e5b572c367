//! Archive writer
//!
//! Serializes a snapshot into the fixed export layout, pulling the content
//! stream one record at a time so memory stays bounded by a single blob
//! plus the compressor's window, whatever the store size.

use std::collections::BTreeMap;
use std::io::{Seek, Write};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::backup::types::{ExportManifest, ExportOptions, ExportOutcome, ExportStats};
use crate::backup::{
    BINARY_OBJECTS_DIR, CHAT_CONTENTS_DIR, CHAT_GROUPS_DIR, CHAT_METAS_FILE, EXPORT_FILE_PREFIX,
    HIERARCHY_FILE, MANIFEST_FILE, MAX_FILE_NAME_BYTES, SETTINGS_FILE, SHARD_INDEX_FILE,
};
use crate::binary::ShardIndex;
use crate::chat::{ChatMeta, HierarchyNode};
use crate::error::{CoreError, Result};
use crate::snapshot::{ContentRecord, Snapshot};
use crate::storage::StorageProvider;

#[derive(Serialize)]
struct HierarchyFile<'a> {
    items: &'a [HierarchyNode],
}

#[derive(Serialize)]
struct ChatMetasFile<'a> {
    entries: &'a [ChatMeta],
}

/// Replace characters that cannot appear in portable filenames
fn sanitize_file_segment(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Build the export filename: prefix, optional sanitized segment, ISO date
///
/// The segment is truncated by UTF-8 byte length (never mid-character) so
/// the whole filename fits in [`MAX_FILE_NAME_BYTES`] bytes.
pub fn export_file_name(segment: Option<&str>, date: NaiveDate) -> String {
    let date_part = date.format("%Y-%m-%d").to_string();
    let fixed = EXPORT_FILE_PREFIX.len() + 1 + date_part.len() + ".zip".len();

    let segment = segment
        .map(sanitize_file_segment)
        .filter(|s| !s.is_empty());

    if let Some(segment) = segment {
        let budget = MAX_FILE_NAME_BYTES.saturating_sub(fixed + 1);
        let segment = truncate_at_char_boundary(&segment, budget);
        if !segment.is_empty() {
            return format!("{EXPORT_FILE_PREFIX}-{segment}-{date_part}.zip");
        }
    }
    format!("{EXPORT_FILE_PREFIX}-{date_part}.zip")
}

fn start_member<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(path, options)
        .map_err(|e| CoreError::archive_write_failed(path, e))
}

fn write_member<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &str,
    options: SimpleFileOptions,
    bytes: &[u8],
) -> Result<()> {
    start_member(zip, path, options)?;
    zip.write_all(bytes)
        .map_err(|e| CoreError::io(format!("writing archive member {path}"), e))
}

fn write_json_member<W: Write + Seek, T: Serialize>(
    zip: &mut ZipWriter<W>,
    path: &str,
    options: SimpleFileOptions,
    value: &T,
) -> Result<u64> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::serialization(path.to_string(), e))?;
    write_member(zip, path, options, &bytes)?;
    Ok(bytes.len() as u64)
}

/// Serialize a snapshot into `out` as a compressed export archive
///
/// The content stream is consumed; an error from it aborts the write and
/// nothing reaches persistent storage unless the caller flushes `out`.
pub async fn write_archive<W: Write + Seek>(
    mut snapshot: Snapshot,
    options: &ExportOptions,
    out: W,
) -> Result<ExportOutcome> {
    let file_name = export_file_name(
        options.file_name.as_deref(),
        chrono::Utc::now().date_naive(),
    );
    // Members live one level down, in a folder named after the file stem.
    let root = format!("{}/", &file_name[..file_name.len() - ".zip".len()]);

    let mut zip = ZipWriter::new(out);
    let member_options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = ExportManifest::now();
    write_json_member(&mut zip, &format!("{root}{MANIFEST_FILE}"), member_options, &manifest)?;

    if let Some(settings) = &snapshot.structure.settings {
        write_json_member(&mut zip, &format!("{root}{SETTINGS_FILE}"), member_options, settings)?;
    }

    write_json_member(
        &mut zip,
        &format!("{root}{HIERARCHY_FILE}"),
        member_options,
        &HierarchyFile {
            items: &snapshot.structure.hierarchy,
        },
    )?;

    let mut stats = ExportStats::default();

    for group in &snapshot.structure.groups {
        write_json_member(
            &mut zip,
            &format!("{root}{CHAT_GROUPS_DIR}/{}.json", group.id),
            member_options,
            group,
        )?;
        stats.groups += 1;
    }

    write_json_member(
        &mut zip,
        &format!("{root}{CHAT_METAS_FILE}"),
        member_options,
        &ChatMetasFile {
            entries: &snapshot.structure.chat_metas,
        },
    )?;

    // Content phase: one record in flight at a time.
    let mut shard_indexes: BTreeMap<String, ShardIndex> = BTreeMap::new();
    while let Some(record) = snapshot.content.next_record().await? {
        match record {
            ContentRecord::Chat { id, content } => {
                let written = write_json_member(
                    &mut zip,
                    &format!("{root}{CHAT_CONTENTS_DIR}/{id}.json"),
                    member_options,
                    &content,
                )?;
                stats.chats += 1;
                stats.content_bytes += written;
            }
            ContentRecord::Binary(object) => {
                let shard = object.shard();
                let base = format!("{root}{BINARY_OBJECTS_DIR}/{shard}");
                write_member(
                    &mut zip,
                    &format!("{base}/{}.bin", object.id),
                    member_options,
                    &object.data,
                )?;
                // Zero-byte marker: only fully-written objects carry one.
                start_member(
                    &mut zip,
                    &format!("{base}/.{}.bin.complete", object.id),
                    member_options,
                )?;
                stats.binary_objects += 1;
                stats.content_bytes += object.data.len() as u64;
                shard_indexes.entry(shard).or_default().insert(object.meta());
            }
        }
    }

    for (shard, index) in &shard_indexes {
        write_json_member(
            &mut zip,
            &format!("{root}{BINARY_OBJECTS_DIR}/{shard}/{SHARD_INDEX_FILE}"),
            member_options,
            index,
        )?;
    }

    zip.finish()
        .map_err(|e| CoreError::archive_write_failed(file_name.clone(), e))?;

    info!(
        file = %file_name,
        chats = stats.chats,
        groups = stats.groups,
        binary_objects = stats.binary_objects,
        "export archive written"
    );

    Ok(ExportOutcome {
        file_name,
        manifest,
        stats,
    })
}

/// Export a provider's whole store: dump, then stream into `out`
pub async fn export_store<W: Write + Seek, P: StorageProvider + ?Sized>(
    provider: &P,
    options: &ExportOptions,
    out: W,
) -> Result<ExportOutcome> {
    let snapshot = provider.dump_without_lock().await?;
    write_archive(snapshot, options, out).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ContentStream, Snapshot, StoreStructure};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    struct FailingStream;

    #[async_trait]
    impl ContentStream for FailingStream {
        async fn next_record(&mut self) -> crate::error::Result<Option<crate::snapshot::ContentRecord>> {
            Err(CoreError::archive_entry_missing("chat-contents/poof.json"))
        }
    }

    #[tokio::test]
    async fn test_content_stream_error_aborts_export() {
        let snapshot = Snapshot::new(StoreStructure::default(), Box::new(FailingStream));
        let error = write_archive(
            snapshot,
            &ExportOptions::default(),
            Cursor::new(Vec::new()),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, CoreError::ArchiveEntryMissing { .. }));
    }

    #[test]
    fn test_plain_file_name() {
        assert_eq!(
            export_file_name(None, date()),
            "weft-export-2026-08-07.zip"
        );
    }

    #[test]
    fn test_segment_is_sanitized() {
        assert_eq!(
            export_file_name(Some("work: a/b"), date()),
            "weft-export-work_ a_b-2026-08-07.zip"
        );
    }

    #[test]
    fn test_long_segment_respects_byte_budget() {
        let segment = "x".repeat(300);
        let name = export_file_name(Some(&segment), date());
        assert!(name.len() <= MAX_FILE_NAME_BYTES);
        assert!(name.starts_with("weft-export-x"));
        assert!(name.ends_with("-2026-08-07.zip"));
    }

    #[test]
    fn test_truncation_never_splits_characters() {
        let segment = "日".repeat(200);
        let name = export_file_name(Some(&segment), date());
        assert!(name.len() <= MAX_FILE_NAME_BYTES);
        // Still valid UTF-8 by construction; the date suffix must be intact
        assert!(name.ends_with("-2026-08-07.zip"));
    }

    #[test]
    fn test_blank_segment_is_dropped() {
        assert_eq!(
            export_file_name(Some("   "), date()),
            "weft-export-2026-08-07.zip"
        );
    }
}
