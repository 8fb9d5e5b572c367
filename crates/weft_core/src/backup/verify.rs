//! Plan verification
//!
//! Drains a plan's content stream to the end without calling the Storage
//! Provider, so structural failures surface before a destructive commit.
//! The snapshot is consumed — execution needs a freshly built plan.

use tracing::debug;

use crate::error::Result;
use crate::snapshot::{ContentRecord, Snapshot};

/// What a successful dry-run saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub chats: u64,
    pub binary_objects: u64,
    pub content_bytes: u64,
}

/// Exhaustively drain `snapshot`'s content stream, propagating any error
pub async fn verify_snapshot(mut snapshot: Snapshot) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    while let Some(record) = snapshot.content.next_record().await? {
        match record {
            ContentRecord::Chat { .. } => report.chats += 1,
            ContentRecord::Binary(object) => {
                report.binary_objects += 1;
                report.content_bytes += object.data.len() as u64;
            }
        }
    }
    debug!(
        chats = report.chats,
        binary_objects = report.binary_objects,
        "content stream verified"
    );
    Ok(report)
}
