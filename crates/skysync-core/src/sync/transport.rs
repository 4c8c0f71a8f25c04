//! Abstract request/response contract with the remote endpoint, plus the
//! `reqwest`-backed implementation.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Method;
use thiserror::Error;

use crate::models::SyncMethod;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

/// A single call against the remote endpoint.
#[derive(Clone)]
pub struct RemoteRequest {
    pub method: SyncMethod,
    /// Path relative to the transport's base URL, including any query string
    pub path: String,
    pub bearer_token: Option<String>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

impl RemoteRequest {
    pub fn new(method: SyncMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer_token: None,
            body: None,
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for RemoteRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("body_bytes", &self.body.as_ref().map(Vec::len))
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Status and raw body returned by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    /// Parsed `Retry-After` header
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure to obtain any response at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Remote endpoint collaborator.
#[allow(async_fn_in_trait)]
pub trait RemoteTransport {
    async fn send(
        &self,
        request: RemoteRequest,
    ) -> std::result::Result<RemoteResponse, TransportError>;
}

/// HTTP transport against a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                Error::InvalidInput(format!("Failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{path}", self.base_url)
    }
}

impl RemoteTransport for HttpTransport {
    async fn send(
        &self,
        request: RemoteRequest,
    ) -> std::result::Result<RemoteResponse, TransportError> {
        let method = match request.method {
            SyncMethod::Get => Method::GET,
            SyncMethod::Post => Method::POST,
            SyncMethod::Put => Method::PUT,
            SyncMethod::Delete => Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.url_for(&request.path))
            .header("Accept", "application/json");
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|error| self.map_error(&error))?;
        let status = response.status().as_u16();
        let retry_after = parse_retry_after_header(response.headers(), Utc::now());
        let body = response
            .bytes()
            .await
            .map_err(|error| self.map_error(&error))?;

        Ok(RemoteResponse {
            status,
            retry_after,
            body: body.to_vec(),
        })
    }
}

impl HttpTransport {
    fn map_error(&self, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Connection(error.to_string())
        }
    }
}

fn parse_retry_after_header(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(value, now)
}

/// Parse a `Retry-After` value given either as delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
    if !is_http_url(&base) {
        return Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
    }

    #[test]
    fn url_for_joins_without_double_slashes() {
        let transport =
            HttpTransport::new("https://api.example.com/v1/", Duration::from_secs(8)).unwrap();
        assert_eq!(transport.base_url(), "https://api.example.com/v1");
        assert_eq!(
            transport.url_for("/contacts?ids=a"),
            "https://api.example.com/v1/contacts?ids=a"
        );
    }

    #[test]
    fn retry_after_accepts_seconds_and_http_dates() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_retry_after(" 7 ", now), Some(Duration::from_secs(7)));
        assert_eq!(
            parse_retry_after("Wed, 01 May 2024 12:00:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 01 May 2024 11:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn request_debug_redacts_token_and_body() {
        let request = RemoteRequest::new(SyncMethod::Put, "contacts")
            .with_bearer_token(Some("secret-token".to_string()))
            .with_body("application/json", b"{\"id\":\"c1\"}".to_vec());
        let debug = format!("{request:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("c1"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn success_covers_2xx_only() {
        assert!(RemoteResponse::ok(Vec::new()).is_success());
        let mut response = RemoteResponse::ok(Vec::new());
        response.status = 204;
        assert!(response.is_success());
        response.status = 304;
        assert!(!response.is_success());
    }
}
