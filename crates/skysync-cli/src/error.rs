use std::io;

use skysync_core::{MetadataError, ResolutionError, SyncError, TranscodeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] skysync_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No JSON input provided; pass --input or pipe a document on stdin")]
    MissingInput,
    #[error("Record id cannot be empty")]
    EmptyRecordId,
    #[error("{failed} of {total} records were not synced")]
    PartialFailure { failed: usize, total: usize },
    #[error("No metadata stored for record: {0}")]
    MetadataNotFound(String),
    #[error("Manual resolution required; both versions were written to stderr")]
    ManualResolution,
    #[error(
        "File storage is not configured. Set R2_ACCOUNT_ID, R2_BUCKET, R2_ACCESS_KEY_ID and R2_SECRET_ACCESS_KEY."
    )]
    StorageNotConfigured,
}
