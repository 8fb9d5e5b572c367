//! Import session state machine
//!
//! `Idle → Analyzing → Previewed → (Verifying → VerifiedOk|VerifyFailed) →
//! Executing → Committed|Failed`. The one hard rule: a Replace cannot
//! execute — and therefore cannot call `clear_all` — unless this session
//! verified the plan first. Append is non-destructive to existing records
//! and may execute straight from the preview.

use tracing::info;

use crate::backup::analyze::{ArchiveAnalysis, analyze};
use crate::backup::append::{AppendOptions, plan_append};
use crate::backup::reader::ArchiveSource;
use crate::backup::replace::plan_replace;
use crate::backup::settings_merge::{SettingsMergeSpec, merge_settings};
use crate::backup::types::ImportMode;
use crate::backup::verify::{VerifyReport, verify_snapshot};
use crate::error::{CoreError, Result};
use crate::storage::StorageProvider;

/// Where an import session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Analyzing,
    Previewed,
    Verifying,
    VerifiedOk,
    VerifyFailed,
    Executing,
    Committed,
    Failed,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ImportPhase::Idle => "idle",
            ImportPhase::Analyzing => "analyzing",
            ImportPhase::Previewed => "previewed",
            ImportPhase::Verifying => "verifying",
            ImportPhase::VerifiedOk => "verified",
            ImportPhase::VerifyFailed => "verify-failed",
            ImportPhase::Executing => "executing",
            ImportPhase::Committed => "committed",
            ImportPhase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Everything `execute` needs to know
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub settings: SettingsMergeSpec,
    pub append: AppendOptions,
}

impl ImportOptions {
    pub fn replace() -> Self {
        Self {
            mode: ImportMode::Replace,
            settings: SettingsMergeSpec::default(),
            append: AppendOptions::default(),
        }
    }

    pub fn append(options: AppendOptions) -> Self {
        Self {
            mode: ImportMode::Append,
            settings: SettingsMergeSpec::default(),
            append: options,
        }
    }
}

/// Structure-level summary of a committed import
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub chats: usize,
    pub groups: usize,
    pub hierarchy_len: usize,
}

/// One import operation over one archive source
pub struct ImportSession<S: ArchiveSource> {
    source: S,
    phase: ImportPhase,
    analysis: Option<ArchiveAnalysis>,
}

impl<S: ArchiveSource> ImportSession<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            phase: ImportPhase::Idle,
            analysis: None,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    pub fn analysis(&self) -> Option<&ArchiveAnalysis> {
        self.analysis.as_ref()
    }

    /// Summarize the archive for user confirmation
    pub async fn analyze(&mut self) -> Result<&ArchiveAnalysis> {
        self.phase = ImportPhase::Analyzing;
        match analyze(&self.source) {
            Ok(analysis) => {
                self.phase = ImportPhase::Previewed;
                Ok(&*self.analysis.insert(analysis))
            }
            Err(e) => {
                self.phase = ImportPhase::Idle;
                Err(e)
            }
        }
    }

    /// Dry-run the Replace translation's content stream
    ///
    /// Builds a fresh plan (streams are single-shot) and drains it without
    /// touching any store. Required before a Replace may execute.
    pub async fn verify(&mut self) -> Result<VerifyReport> {
        if !matches!(
            self.phase,
            ImportPhase::Previewed | ImportPhase::VerifiedOk | ImportPhase::VerifyFailed
        ) {
            return Err(CoreError::invalid_import_state(
                "previewed",
                self.phase.to_string(),
            ));
        }

        self.phase = ImportPhase::Verifying;
        let outcome = match plan_replace(&self.source) {
            Ok(snapshot) => verify_snapshot(snapshot).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(report) => {
                self.phase = ImportPhase::VerifiedOk;
                Ok(report)
            }
            Err(e) => {
                self.phase = ImportPhase::VerifyFailed;
                Err(e)
            }
        }
    }

    /// Commit the import against `provider`
    ///
    /// Replace requires a passed verification in this session; only then is
    /// `clear_all` called. Settings merge runs before anything destructive
    /// so an invalid strategy can never leave a wiped store behind.
    pub async fn execute<P: StorageProvider + ?Sized>(
        &mut self,
        provider: &P,
        options: &ImportOptions,
    ) -> Result<ImportReport> {
        match options.mode {
            ImportMode::Replace => {
                if self.phase != ImportPhase::VerifiedOk {
                    return Err(CoreError::invalid_import_state(
                        "verified",
                        self.phase.to_string(),
                    ));
                }
            }
            ImportMode::Append => {
                if !matches!(self.phase, ImportPhase::Previewed | ImportPhase::VerifiedOk) {
                    return Err(CoreError::invalid_import_state(
                        "previewed",
                        self.phase.to_string(),
                    ));
                }
            }
        }

        let current_settings = provider.load_settings().await?;

        let mut snapshot = match options.mode {
            ImportMode::Replace => plan_replace(&self.source)?,
            ImportMode::Append => {
                let current_hierarchy = provider.load_hierarchy().await?;
                plan_append(&self.source, current_hierarchy, &options.append)?
            }
        };

        let incoming = snapshot.structure.settings.take().unwrap_or_default();
        let merged = merge_settings(current_settings, incoming, &options.settings)?;
        snapshot.structure.settings = Some(merged);

        let report = ImportReport {
            mode: options.mode,
            chats: snapshot.structure.chat_metas.len(),
            groups: snapshot.structure.groups.len(),
            hierarchy_len: snapshot.structure.hierarchy.len(),
        };

        self.phase = ImportPhase::Executing;
        let outcome = async {
            if options.mode == ImportMode::Replace {
                provider.clear_all().await?;
            }
            provider.restore(snapshot).await
        }
        .await;

        match outcome {
            Ok(()) => {
                self.phase = ImportPhase::Committed;
                info!(
                    mode = %report.mode,
                    chats = report.chats,
                    groups = report.groups,
                    "import committed"
                );
                Ok(report)
            }
            Err(e) => {
                self.phase = ImportPhase::Failed;
                Err(e)
            }
        }
    }
}
