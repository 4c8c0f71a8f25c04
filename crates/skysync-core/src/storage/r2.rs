//! Cloudflare R2 backend for plain remote-file transfer.

use std::env;

use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;
use chrono::Utc;
use uuid::Uuid;

use super::{RemoteFileStorage, RemoteObject};
use crate::{Error, Result};

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "R2_PUBLIC_BASE_URL";

/// Cloudflare R2 configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
    /// Optional public URL base for serving files.
    pub public_base_url: Option<String>,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// R2-backed remote file storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R2Storage {
    config: R2Config,
}

impl R2Storage {
    #[must_use]
    pub const fn new(config: R2Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        let client = self.s3_client();
        client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }

    /// Build a unique object key for a file belonging to a record namespace.
    pub fn build_object_key(&self, namespace: &str, file_name: &str) -> Result<String> {
        let namespace = sanitize_token(namespace);
        if namespace.is_empty() {
            return Err(Error::InvalidInput(
                "File namespace cannot be empty".to_string(),
            ));
        }

        let file_name = sanitize_file_name(file_name);
        let ts = Utc::now().timestamp_millis();
        let id = Uuid::now_v7();

        Ok(format!("files/{namespace}/{ts}-{id}-{file_name}"))
    }

    /// Resolve a public URL for an object key when a public base URL is configured.
    pub fn public_object_url(&self, object_key: &str) -> Option<String> {
        let base = self.config.public_base_url.as_ref()?;
        let key = object_key.trim_matches('/');
        if key.is_empty() {
            return None;
        }

        Some(format!("{base}/{key}"))
    }

    /// Check whether an object exists in the configured bucket.
    pub async fn object_exists(&self, object_key: &str) -> Result<bool> {
        let object_key = normalize_object_key(object_key)?;
        let objects = self.list(&object_key).await?;
        Ok(objects.iter().any(|object| object.key == object_key))
    }

    fn s3_client(&self) -> Client {
        build_s3_client(&self.config)
    }
}

impl RemoteFileStorage for R2Storage {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()> {
        let object_key = normalize_object_key(path)?;
        let client = self.s3_client();

        let mut request = client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()));

        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error("put_object", &self.config.bucket, Some(&object_key), error)
        })?;

        tracing::debug!(key = %object_key, bytes = bytes.len(), "Uploaded object");
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<(Vec<u8>, Option<String>)> {
        let object_key = normalize_object_key(path)?;
        let client = self.s3_client();

        let response = client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error("get_object", &self.config.bucket, Some(&object_key), error)
            })?;

        let content_type = normalize_content_type(response.content_type());

        let payload = response.body.collect().await.map_err(|error| {
            storage_error(
                "get_object_body",
                &self.config.bucket,
                Some(&object_key),
                error,
            )
        })?;

        Ok((payload.into_bytes().to_vec(), content_type))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let prefix = prefix.trim().trim_start_matches('/');
        let client = self.s3_client();

        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let response = client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|error| {
                    storage_error(
                        "list_objects_v2",
                        &self.config.bucket,
                        Some(prefix),
                        error,
                    )
                })?;

            objects.extend(response.contents().iter().filter_map(|object| {
                Some(RemoteObject {
                    key: object.key()?.to_string(),
                    size_bytes: object.size().and_then(|size| u64::try_from(size).ok()),
                })
            }));

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let object_key = normalize_object_key(path)?;
        let client = self.s3_client();

        client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "delete_object",
                    &self.config.bucket,
                    Some(&object_key),
                    error,
                )
            })?;

        tracing::debug!(key = %object_key, "Deleted object");
        Ok(())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let value = |key: &str| lookup(key).map(|value| value.trim().to_string());
    let account_id = value(ENV_ACCOUNT_ID);
    let bucket = value(ENV_BUCKET);
    let access_key_id = value(ENV_ACCESS_KEY_ID);
    let secret_access_key = value(ENV_SECRET_ACCESS_KEY);
    let public_base_url = value(ENV_PUBLIC_BASE_URL);

    let any_present = account_id.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some()
        || public_base_url.is_some();

    if !any_present {
        return Ok(None);
    }

    let required = |value: Option<String>, key: &'static str, missing: &mut Vec<&str>| {
        let value = value.filter(|value| !value.is_empty());
        if value.is_none() {
            missing.push(key);
        }
        value.unwrap_or_default()
    };

    let mut missing = Vec::new();
    let account_id = required(account_id, ENV_ACCOUNT_ID, &mut missing);
    let bucket = required(bucket, ENV_BUCKET, &mut missing);
    let access_key_id = required(access_key_id, ENV_ACCESS_KEY_ID, &mut missing);
    let secret_access_key = required(secret_access_key, ENV_SECRET_ACCESS_KEY, &mut missing);

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    Ok(Some(R2Config {
        account_id,
        bucket,
        access_key_id,
        secret_access_key,
        public_base_url: normalize_public_base_url(public_base_url)?,
    }))
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "skysync-core-r2-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("R2 {operation} failed for {target}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput(
            "Remote file path cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn normalize_public_base_url(public_base_url: Option<String>) -> Result<Option<String>> {
    let Some(value) = public_base_url.filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if !value.starts_with("https://") && !value.starts_with("http://") {
        return Err(Error::InvalidInput(
            "R2_PUBLIC_BASE_URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(Some(value.trim_end_matches('/').to_string()))
}

fn sanitize_file_name(file_name: &str) -> String {
    let trimmed = file_name.trim().trim_matches('/');
    if trimmed.is_empty() {
        return "file".to_string();
    }

    let (stem, ext) = trimmed
        .rsplit_once('.')
        .map_or((trimmed, ""), |parts| parts);
    let stem = sanitize_token(stem);
    let stem = if stem.is_empty() {
        "file".to_string()
    } else {
        stem
    };
    let ext = sanitize_token(ext);

    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}
