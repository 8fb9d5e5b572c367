use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Cannot open archive")]
    #[diagnostic(
        code(weft_core::archive_open_failed),
        help("The file may not be a Weft export archive, or it may be truncated")
    )]
    ArchiveOpenFailed {
        #[source]
        cause: zip::result::ZipError,
    },

    #[error("No export manifest in archive")]
    #[diagnostic(
        code(weft_core::manifest_not_found),
        help("A Weft export contains an export-manifest.json at its root folder")
    )]
    ManifestNotFound,

    #[error("Archive member missing: {path}")]
    #[diagnostic(
        code(weft_core::archive_entry_missing),
        help("The archive references data it does not contain; it may have been edited or truncated")
    )]
    ArchiveEntryMissing { path: String },

    #[error("Failed to read archive member {path}")]
    #[diagnostic(code(weft_core::archive_entry_read))]
    ArchiveEntryRead {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Malformed record in {path}")]
    #[diagnostic(
        code(weft_core::malformed_record),
        help("The JSON in this archive member does not match the expected schema")
    )]
    MalformedRecord {
        path: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("Failed to write archive member {path}")]
    #[diagnostic(code(weft_core::archive_write_failed))]
    ArchiveWriteFailed {
        path: String,
        #[source]
        cause: zip::result::ZipError,
    },

    #[error("Serialization error")]
    #[diagnostic(
        code(weft_core::serialization_error),
        help("Failed to serialize {data_type}")
    )]
    SerializationError {
        data_type: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("I/O error during {operation}")]
    #[diagnostic(code(weft_core::io_error))]
    Io {
        operation: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Import step not allowed: expected {expected}, session is {actual}")]
    #[diagnostic(
        code(weft_core::invalid_import_state),
        help("A destructive replace must pass verification before it can execute")
    )]
    InvalidImportState { expected: String, actual: String },

    #[error("Merge strategy 'append' is not valid for settings field '{field}'")]
    #[diagnostic(
        code(weft_core::invalid_merge_strategy),
        help("Only the provider-profile list can be appended; scalar fields accept 'replace' or 'none'")
    )]
    InvalidMergeStrategy { field: String },

    #[error("Storage operation failed: {operation}")]
    #[diagnostic(code(weft_core::storage_failed))]
    StorageFailed {
        operation: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Configuration error")]
    #[diagnostic(code(weft_core::config_error), help("Check the backup config file syntax"))]
    ConfigError {
        path: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn archive_entry_missing(path: impl Into<String>) -> Self {
        Self::ArchiveEntryMissing { path: path.into() }
    }

    pub fn archive_entry_read(path: impl Into<String>, cause: std::io::Error) -> Self {
        Self::ArchiveEntryRead {
            path: path.into(),
            cause,
        }
    }

    pub fn malformed_record(path: impl Into<String>, cause: serde_json::Error) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            cause,
        }
    }

    pub fn archive_write_failed(path: impl Into<String>, cause: zip::result::ZipError) -> Self {
        Self::ArchiveWriteFailed {
            path: path.into(),
            cause,
        }
    }

    pub fn serialization(data_type: impl Into<String>, cause: serde_json::Error) -> Self {
        Self::SerializationError {
            data_type: data_type.into(),
            cause,
        }
    }

    pub fn io(operation: impl Into<String>, cause: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            cause,
        }
    }

    pub fn invalid_import_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidImportState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn storage_failed(
        operation: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StorageFailed {
            operation: operation.into(),
            cause: Box::new(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    #[test]
    fn test_missing_entry_error_mentions_path() {
        let error = CoreError::archive_entry_missing("chat-contents/chat_abc.json");
        let report = Report::new(error);
        let output = format!("{:?}", report);
        assert!(output.contains("archive_entry_missing"));
        assert!(output.contains("chat-contents/chat_abc.json"));
    }

    #[test]
    fn test_invalid_merge_strategy_names_field() {
        let error = CoreError::InvalidMergeStrategy {
            field: "theme".to_string(),
        };
        let report = Report::new(error);
        let output = format!("{:?}", report);
        assert!(output.contains("invalid_merge_strategy"));
        assert!(output.contains("theme"));
    }
}
