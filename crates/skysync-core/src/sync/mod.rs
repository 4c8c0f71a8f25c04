//! Batching, retrying dispatcher between local records and the remote store.
//!
//! Submissions are validated, carved into ordered batches and sent one
//! batch per network call. Each batch is retried independently, so a batch
//! that exhausts its attempts only fails its own records. Successful writes
//! persist any attached attribute metadata; live photos are transcoded on
//! the way out and on the way back in.

mod error;
mod retry;
mod transport;

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use serde_json::Value;
use uuid::Uuid;

use crate::config::SyncSettings;
use crate::conflict::{self, ConflictStrategy};
use crate::media::{MotionPhotoTranscoder, VideoTranscoder};
use crate::metadata::{translate_metadata, MetadataError, MetadataStore};
use crate::models::{
    AppliedRecord, AttributeBag, FailureKind, LivePhotoPair, LivePhotoUpload, SyncFailure,
    SyncInput, SyncMethod, SyncOutcome, SyncRecord,
};
use crate::util::storage_key_for_id;

pub use error::{SyncError, SyncResult};
pub use retry::RetryPolicy;
pub use transport::{
    parse_retry_after, HttpTransport, RemoteRequest, RemoteResponse, RemoteTransport,
    TransportError,
};

const JSON_CONTENT_TYPE: &str = "application/json";
const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Orchestrates remote calls for records, metadata and live photos.
#[derive(Debug)]
pub struct SyncDispatcher<T, S, V> {
    settings: SyncSettings,
    transport: T,
    store: S,
    transcoder: MotionPhotoTranscoder<V>,
}

impl<T, S, V> SyncDispatcher<T, S, V>
where
    T: RemoteTransport,
    S: MetadataStore,
    V: VideoTranscoder,
{
    pub fn new(
        settings: SyncSettings,
        transport: T,
        store: S,
        transcoder: MotionPhotoTranscoder<V>,
    ) -> Self {
        Self {
            settings,
            transport,
            store,
            transcoder,
        }
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Push or pull one record or a collection of records.
    ///
    /// Only an unusable endpoint fails the whole call; every other failure is
    /// reported per record in the returned outcome.
    pub async fn sync(
        &self,
        endpoint: &str,
        input: impl Into<SyncInput>,
        method: SyncMethod,
    ) -> SyncResult<SyncOutcome> {
        let endpoint = normalize_endpoint(endpoint)?;
        let mut outcome = SyncOutcome::default();

        let mut records = Vec::new();
        for (index, entry) in input.into().into_entries().into_iter().enumerate() {
            match SyncRecord::from_value(entry) {
                Ok(record) => records.push(record),
                Err(message) => {
                    tracing::warn!(endpoint = %endpoint, index, %message, "Rejected record");
                    outcome.errors.push(SyncFailure {
                        id: format!("record[{index}]"),
                        kind: FailureKind::Validation,
                        error: message,
                        status: None,
                    });
                }
            }
        }

        let batch_size = self.settings.batch_size.max(1);
        let batch_count = records.len().div_ceil(batch_size);
        for (index, batch) in records.chunks(batch_size).enumerate() {
            let label = format!("{method} {endpoint} batch {}/{batch_count}", index + 1);
            match self.dispatch_batch(&endpoint, method, batch, &label).await {
                Ok(body) => {
                    for (record, result) in batch.iter().zip(pair_results(batch, body)) {
                        outcome.applied.push(AppliedRecord {
                            id: record.id().to_string(),
                            result,
                        });
                        if method.is_write() {
                            if let Err(error) = self.persist_metadata(record).await {
                                tracing::warn!(id = record.id(), %error, "Metadata persistence failed");
                                outcome.metadata_failures.push(failure_for(record.id(), &error));
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(batch = %label, records = batch.len(), %error, "Batch failed");
                    outcome
                        .errors
                        .extend(batch.iter().map(|record| failure_for(record.id(), &error)));
                }
            }
        }

        tracing::info!(
            endpoint = %endpoint,
            %method,
            applied = outcome.applied.len(),
            failed = outcome.errors.len(),
            metadata_failures = outcome.metadata_failures.len(),
            "Sync finished"
        );
        Ok(outcome)
    }

    /// Splice a still and its clip and upload them as one remote asset.
    ///
    /// Transcoding and upload are retried together.
    pub async fn sync_live_photo(
        &self,
        still_path: &Path,
        video_path: &Path,
    ) -> SyncResult<LivePhotoUpload> {
        let id = Uuid::now_v7().to_string();
        let path = format!("{}/{id}", self.live_photo_endpoint()?);
        let (id, path) = (&id, &path);

        let upload = self
            .settings
            .retry_policy()
            .run("live photo upload", move |_| async move {
                let spliced = self
                    .transcoder
                    .to_remote_encoding(still_path, video_path)
                    .await?;
                let size_bytes = spliced.len();
                let request = RemoteRequest::new(SyncMethod::Put, path.as_str())
                    .with_bearer_token(self.settings.access_token.clone())
                    .with_body(JPEG_CONTENT_TYPE, spliced);
                let response = self.send_once(request).await?;
                Ok::<_, SyncError>(LivePhotoUpload {
                    id: id.clone(),
                    size_bytes,
                    response: parse_json_body(&response.body),
                })
            })
            .await?;

        tracing::info!(id = %upload.id, bytes = upload.size_bytes, "Uploaded live photo");
        Ok(upload)
    }

    /// Fetch a spliced live photo and convert it to the local two-asset form.
    pub async fn download_and_convert_live_photo(&self, id: &str) -> SyncResult<LivePhotoPair> {
        let key = storage_key_for_id(id)
            .ok_or_else(|| SyncError::Validation(format!("Invalid live photo id '{id}'")))?;
        let path = format!("{}/{key}", self.live_photo_endpoint()?);
        let path = &path;

        self.settings
            .retry_policy()
            .run("live photo download", move |_| async move {
                let request = RemoteRequest::new(SyncMethod::Get, path.as_str())
                    .with_bearer_token(self.settings.access_token.clone());
                let response = self.send_once(request).await?;
                self.transcoder
                    .to_local_encoding_bytes(&response.body)
                    .await
                    .map_err(SyncError::from)
            })
            .await
    }

    /// Reconcile two versions of a record with the named strategy, or the
    /// default one when `strategy` is `None`.
    pub fn resolve_conflict(
        &self,
        local: &Value,
        remote: &Value,
        strategy: Option<&str>,
    ) -> SyncResult<Value> {
        let strategy = strategy
            .map(str::parse::<ConflictStrategy>)
            .transpose()?
            .unwrap_or_default();
        Ok(conflict::resolve(local, remote, strategy)?)
    }

    /// Attribute bag persisted for a record by an earlier write.
    pub async fn metadata(&self, id: &str) -> SyncResult<Option<AttributeBag>> {
        Ok(self.store.get(id).await.map_err(MetadataError::from)?)
    }

    async fn dispatch_batch(
        &self,
        endpoint: &str,
        method: SyncMethod,
        batch: &[SyncRecord],
        label: &str,
    ) -> SyncResult<Option<Value>> {
        let request = self.batch_request(endpoint, method, batch)?;
        let request = &request;
        let response = self
            .settings
            .retry_policy()
            .run(label, move |_| self.send_once(request.clone()))
            .await?;
        Ok(parse_json_body(&response.body))
    }

    fn batch_request(
        &self,
        endpoint: &str,
        method: SyncMethod,
        batch: &[SyncRecord],
    ) -> SyncResult<RemoteRequest> {
        let request = if method.carries_body() {
            let body = serde_json::to_vec(batch)
                .map_err(|error| SyncError::Validation(format!("Unserializable batch: {error}")))?;
            RemoteRequest::new(method, endpoint).with_body(JSON_CONTENT_TYPE, body)
        } else {
            let ids = batch
                .iter()
                .map(|record| urlencoding::encode(record.id()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            RemoteRequest::new(method, format!("{endpoint}?ids={ids}"))
        };
        Ok(request.with_bearer_token(self.settings.access_token.clone()))
    }

    /// One bounded network call. Timeouts count as transient failures.
    async fn send_once(&self, request: RemoteRequest) -> SyncResult<RemoteResponse> {
        let timeout = self.settings.request_timeout;
        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| SyncError::from(TransportError::Timeout(timeout)))??;

        if response.is_success() {
            Ok(response)
        } else {
            Err(SyncError::from_response(&response))
        }
    }

    async fn persist_metadata(&self, record: &SyncRecord) -> SyncResult<()> {
        let Some(metadata) = record.metadata() else {
            return Ok(());
        };
        let bag = translate_metadata(metadata)?;
        self.store
            .save(record.id(), &bag)
            .await
            .map_err(MetadataError::from)?;
        Ok(())
    }

    fn live_photo_endpoint(&self) -> SyncResult<String> {
        normalize_endpoint(&self.settings.live_photo_endpoint)
    }
}

fn normalize_endpoint(endpoint: &str) -> SyncResult<String> {
    let endpoint = endpoint.trim().trim_matches('/');
    if endpoint.is_empty() {
        return Err(SyncError::Validation(
            "Endpoint must not be empty".to_string(),
        ));
    }
    Ok(endpoint.to_string())
}

fn failure_for(id: &str, error: &SyncError) -> SyncFailure {
    SyncFailure {
        id: id.to_string(),
        kind: error.kind(),
        error: error.to_string(),
        status: error.status(),
    }
}

fn parse_json_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(body).ok()
}

/// Match response elements to the records of a batch.
///
/// Arrays are matched by element `id` when the elements carry one, otherwise
/// by position when the lengths agree. Records sharing an id take that id's
/// elements in response order. A single object answers a single-record
/// batch.
fn pair_results(batch: &[SyncRecord], body: Option<Value>) -> Vec<Option<Value>> {
    match body {
        Some(Value::Array(items)) => pair_array(batch, items),
        Some(value) if batch.len() == 1 && !value.is_null() => vec![Some(value)],
        _ => vec![None; batch.len()],
    }
}

fn pair_array(batch: &[SyncRecord], items: Vec<Value>) -> Vec<Option<Value>> {
    let keyed = items
        .iter()
        .any(|item| item.get("id").and_then(Value::as_str).is_some());

    if keyed {
        let mut by_id: HashMap<String, VecDeque<Value>> = HashMap::with_capacity(items.len());
        for item in items {
            if let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) {
                by_id.entry(id).or_default().push_back(item);
            }
        }
        return batch
            .iter()
            .map(|record| by_id.get_mut(record.id()).and_then(VecDeque::pop_front))
            .collect();
    }

    if items.len() == batch.len() {
        return items.into_iter().map(Some).collect();
    }
    vec![None; batch.len()]
}
