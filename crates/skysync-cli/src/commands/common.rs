use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use skysync_core::media::FfmpegTranscoder;
use skysync_core::metadata::FileMetadataStore;
use skysync_core::models::SyncFailure;
use skysync_core::storage::{R2Config, R2Storage};
use skysync_core::sync::HttpTransport;
use skysync_core::{MotionPhotoTranscoder, SyncDispatcher, SyncOutcome, SyncSettings};

use crate::error::CliError;

pub type CliDispatcher = SyncDispatcher<HttpTransport, FileMetadataStore, FfmpegTranscoder>;

/// Settings from the environment with command-line overrides applied.
pub fn load_settings(
    api_base_url: Option<String>,
    metadata_dir: Option<PathBuf>,
) -> Result<SyncSettings, CliError> {
    let mut settings = SyncSettings::from_env()?;
    if let Some(url) = api_base_url {
        settings = settings.with_api_base_url(url.trim().trim_end_matches('/'));
    }
    let metadata_dir =
        resolve_metadata_dir(metadata_dir.or_else(|| settings.metadata_dir.clone()));
    Ok(settings.with_metadata_dir(metadata_dir))
}

pub fn resolve_metadata_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_metadata_dir)
}

pub fn default_metadata_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skysync")
        .join("metadata")
}

pub fn metadata_store(settings: &SyncSettings) -> FileMetadataStore {
    FileMetadataStore::new(resolve_metadata_dir(settings.metadata_dir.clone()))
}

pub fn motion_transcoder(settings: &SyncSettings) -> MotionPhotoTranscoder<FfmpegTranscoder> {
    MotionPhotoTranscoder::new(FfmpegTranscoder::new(settings.ffmpeg_path.clone()))
}

pub fn build_dispatcher(settings: SyncSettings) -> Result<CliDispatcher, CliError> {
    let transport = HttpTransport::new(settings.require_api_base_url()?, settings.request_timeout)?;
    let store = metadata_store(&settings);
    let transcoder = motion_transcoder(&settings);
    Ok(SyncDispatcher::new(settings, transport, store, transcoder))
}

pub fn open_file_storage() -> Result<R2Storage, CliError> {
    let config = R2Config::from_env()?.ok_or(CliError::StorageNotConfigured)?;
    Ok(R2Storage::new(config))
}

/// Parse JSON from a file, or from stdin when no path is given.
pub fn read_json_input(path: Option<&Path>) -> Result<Value, CliError> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => read_piped_stdin()?.ok_or(CliError::MissingInput)?,
    };
    parse_json_document(&raw)
}

pub fn parse_json_document(raw: &str) -> Result<Value, CliError> {
    if raw.trim().is_empty() {
        return Err(CliError::MissingInput);
    }
    Ok(serde_json::from_str(raw)?)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(Some(buffer))
}

/// Write bytes to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(path) = path {
        std::fs::write(path, bytes)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(bytes)?;
    }
    Ok(())
}

pub fn normalize_record_id(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn format_outcome_lines(outcome: &SyncOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "applied={} failed={} metadata_failures={}",
        outcome.applied.len(),
        outcome.errors.len(),
        outcome.metadata_failures.len()
    )];
    lines.extend(outcome.errors.iter().map(|failure| format_failure("error", failure)));
    lines.extend(
        outcome
            .metadata_failures
            .iter()
            .map(|failure| format_failure("metadata", failure)),
    );
    lines
}

fn format_failure(label: &str, failure: &SyncFailure) -> String {
    let kind = serde_json::to_value(failure.kind)
        .ok()
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_default();
    match failure.status {
        Some(status) => format!(
            "{label:<8}  {:<20}  {kind:<17}  {status}  {}",
            failure.id, failure.error
        ),
        None => format!(
            "{label:<8}  {:<20}  {kind:<17}  -    {}",
            failure.id, failure.error
        ),
    }
}

/// Exit status for a finished sync: any per-record failure is an error.
pub fn outcome_result(outcome: &SyncOutcome) -> Result<(), CliError> {
    let failed = outcome.errors.len() + outcome.metadata_failures.len();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::PartialFailure {
            failed,
            total: outcome.total(),
        })
    }
}

/// File name stem for a record id that is safe inside one directory.
pub fn file_stem_for_id(id: &str) -> Result<String, CliError> {
    skysync_core::util::storage_key_for_id(id).ok_or(CliError::EmptyRecordId)
}
