//! Immutable dispatcher settings.
//!
//! Built once, either from the environment or through the `with_*`
//! builders, and read-only after the dispatcher is constructed.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::RetryPolicy;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_API_BASE_URL: &str = "SKYSYNC_API_BASE_URL";
const ENV_ACCESS_TOKEN: &str = "SKYSYNC_ACCESS_TOKEN";
const ENV_BATCH_SIZE: &str = "SKYSYNC_BATCH_SIZE";
const ENV_MAX_ATTEMPTS: &str = "SKYSYNC_MAX_ATTEMPTS";
const ENV_INITIAL_BACKOFF_MS: &str = "SKYSYNC_INITIAL_BACKOFF_MS";
const ENV_MAX_BACKOFF_SECS: &str = "SKYSYNC_MAX_BACKOFF_SECS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "SKYSYNC_REQUEST_TIMEOUT_SECS";
const ENV_LIVE_PHOTO_ENDPOINT: &str = "SKYSYNC_LIVE_PHOTO_ENDPOINT";
const ENV_FFMPEG_PATH: &str = "SKYSYNC_FFMPEG_PATH";
const ENV_METADATA_DIR: &str = "SKYSYNC_METADATA_DIR";

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_LIVE_PHOTO_ENDPOINT: &str = "live-photos";
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Credentials and limits shared by every dispatcher operation.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Remote endpoint base URL
    pub api_base_url: Option<String>,
    /// Bearer credential sent with every call
    pub access_token: Option<String>,
    /// Records per network call
    pub batch_size: usize,
    /// Attempts per batch, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Longest wait between attempts, server-requested delays included
    pub max_backoff: Duration,
    /// Bound on each individual network call
    pub request_timeout: Duration,
    /// Endpoint that stores spliced live photos
    pub live_photo_endpoint: String,
    /// External transcoder binary
    pub ffmpeg_path: String,
    /// Where translated metadata is persisted; callers pick a default
    pub metadata_dir: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            access_token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            live_photo_endpoint: DEFAULT_LIVE_PHOTO_ENDPOINT.to_string(),
            ffmpeg_path: DEFAULT_FFMPEG_PATH.to_string(),
            metadata_dir: None,
        }
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("api_base_url", &self.api_base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("batch_size", &self.batch_size)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("request_timeout", &self.request_timeout)
            .field("live_photo_endpoint", &self.live_photo_endpoint)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("metadata_dir", &self.metadata_dir)
            .finish()
    }
}

impl SyncSettings {
    /// Load settings from `SKYSYNC_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        parse_settings(|key| env::var(key).ok())
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
        }
    }

    /// Base URL, or an error naming the variable to set.
    pub fn require_api_base_url(&self) -> Result<&str> {
        self.api_base_url.as_deref().ok_or_else(|| {
            Error::InvalidInput(format!(
                "Remote endpoint is not configured. Set {ENV_API_BASE_URL}"
            ))
        })
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_live_photo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.live_photo_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_metadata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metadata_dir = Some(dir.into());
        self
    }
}

fn parse_settings(lookup: impl Fn(&str) -> Option<String>) -> Result<SyncSettings> {
    let value = |key: &str| normalize_text_option(lookup(key));
    let defaults = SyncSettings::default();

    let api_base_url = match value(ENV_API_BASE_URL) {
        Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
        Some(_) => {
            return Err(Error::InvalidInput(format!(
                "{ENV_API_BASE_URL} must start with http:// or https://"
            )))
        }
        None => None,
    };

    let batch_size = parse_positive(ENV_BATCH_SIZE, value(ENV_BATCH_SIZE))?
        .unwrap_or(defaults.batch_size);
    let max_attempts = parse_positive(ENV_MAX_ATTEMPTS, value(ENV_MAX_ATTEMPTS))?
        .unwrap_or(defaults.max_attempts);
    let initial_backoff = parse_number::<u64>(ENV_INITIAL_BACKOFF_MS, value(ENV_INITIAL_BACKOFF_MS))?
        .map_or(defaults.initial_backoff, Duration::from_millis);
    let max_backoff = parse_positive::<u64>(ENV_MAX_BACKOFF_SECS, value(ENV_MAX_BACKOFF_SECS))?
        .map_or(defaults.max_backoff, Duration::from_secs);
    let request_timeout = parse_positive::<u64>(
        ENV_REQUEST_TIMEOUT_SECS,
        value(ENV_REQUEST_TIMEOUT_SECS),
    )?
    .map_or(defaults.request_timeout, Duration::from_secs);

    Ok(SyncSettings {
        api_base_url,
        access_token: value(ENV_ACCESS_TOKEN),
        batch_size,
        max_attempts,
        initial_backoff,
        max_backoff,
        request_timeout,
        live_photo_endpoint: value(ENV_LIVE_PHOTO_ENDPOINT)
            .map(|endpoint| endpoint.trim_matches('/').to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or(defaults.live_photo_endpoint),
        ffmpeg_path: value(ENV_FFMPEG_PATH).unwrap_or(defaults.ffmpeg_path),
        metadata_dir: value(ENV_METADATA_DIR).map(PathBuf::from),
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    raw.map(|raw| {
        raw.parse::<T>()
            .map_err(|_| Error::InvalidInput(format!("{key} must be a number, got '{raw}'")))
    })
    .transpose()
}

fn parse_positive<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match parse_number::<T>(key, raw)? {
        Some(value) if value <= T::default() => Err(Error::InvalidInput(format!(
            "{key} must be greater than zero"
        ))),
        parsed => Ok(parsed),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<SyncSettings> {
        parse_settings(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn parse_settings_defaults_when_unset() {
        let settings = parse_from_map(&HashMap::new()).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.initial_backoff, Duration::from_millis(1_000));
        assert_eq!(settings.max_backoff, Duration::from_secs(60));
        assert_eq!(settings.request_timeout, Duration::from_secs(8));
        assert!(settings.require_api_base_url().is_err());
    }

    #[test]
    fn parse_settings_reads_overrides() {
        let mut map = HashMap::new();
        map.insert(ENV_API_BASE_URL, "https://sync.example.com/api/");
        map.insert(ENV_ACCESS_TOKEN, " token-1 ");
        map.insert(ENV_BATCH_SIZE, "25");
        map.insert(ENV_MAX_ATTEMPTS, "3");
        map.insert(ENV_INITIAL_BACKOFF_MS, "0");
        map.insert(ENV_MAX_BACKOFF_SECS, "30");
        map.insert(ENV_REQUEST_TIMEOUT_SECS, "2");
        map.insert(ENV_LIVE_PHOTO_ENDPOINT, "/media/live/");
        map.insert(ENV_METADATA_DIR, "/var/lib/skysync");

        let settings = parse_from_map(&map).unwrap();
        assert_eq!(
            settings.require_api_base_url().unwrap(),
            "https://sync.example.com/api"
        );
        assert_eq!(settings.access_token.as_deref(), Some("token-1"));
        assert_eq!(settings.batch_size, 25);
        assert_eq!(
            settings.retry_policy(),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::ZERO,
                max_backoff: Duration::from_secs(30),
            }
        );
        assert_eq!(settings.request_timeout, Duration::from_secs(2));
        assert_eq!(settings.live_photo_endpoint, "media/live");
        assert_eq!(
            settings.metadata_dir,
            Some(PathBuf::from("/var/lib/skysync"))
        );
    }

    #[test]
    fn parse_settings_rejects_invalid_numbers() {
        for (key, raw) in [
            (ENV_BATCH_SIZE, "0"),
            (ENV_BATCH_SIZE, "many"),
            (ENV_MAX_ATTEMPTS, "-1"),
            (ENV_REQUEST_TIMEOUT_SECS, "0"),
            (ENV_MAX_BACKOFF_SECS, "0"),
        ] {
            let mut map = HashMap::new();
            map.insert(key, raw);
            let err = parse_from_map(&map).unwrap_err();
            match err {
                Error::InvalidInput(message) => assert!(message.contains(key), "{message}"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn parse_settings_rejects_base_url_without_scheme() {
        let mut map = HashMap::new();
        map.insert(ENV_API_BASE_URL, "sync.example.com");
        assert!(parse_from_map(&map).is_err());
    }

    #[test]
    fn settings_debug_redacts_access_token() {
        let settings = SyncSettings::default().with_access_token("secret");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn builders_clamp_to_usable_values() {
        let settings = SyncSettings::default()
            .with_batch_size(0)
            .with_retry(0, Duration::from_millis(5));
        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.retry_policy().max_attempts, 1);
    }
}
