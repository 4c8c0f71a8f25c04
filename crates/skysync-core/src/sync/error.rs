use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::transport::{RemoteResponse, TransportError};
use crate::conflict::ResolutionError;
use crate::media::TranscodeError;
use crate::metadata::MetadataError;
use crate::models::FailureKind;
use crate::util::compact_text;

/// Caller-visible failure of a sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Transient network failure: {message}")]
    TransientNetwork {
        message: String,
        status: Option<u16>,
    },
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Remote conflict: {message}")]
    Conflict { status: u16, message: String },
    #[error("Not authorized: {message}")]
    Auth { status: u16, message: String },
    #[error("Remote request failed: {message}")]
    Http { status: u16, message: String },
    #[error("Transcoding failed: {0}")]
    Transcoding(#[from] TranscodeError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Metadata failure: {0}")]
    Metadata(#[from] MetadataError),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// HTTP-equivalent status, where one applies.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::TransientNetwork { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            Self::Conflict { status, .. } | Self::Auth { status, .. } | Self::Http { status, .. } => {
                Some(*status)
            }
            Self::Validation(_) | Self::Transcoding(_) | Self::Resolution(_) | Self::Metadata(_) => {
                None
            }
        }
    }

    /// Only timeouts, connection failures, 5xx and 429 are worth another attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. } | Self::RateLimited { .. })
    }

    /// Server-requested delay before the next attempt.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::TransientNetwork { .. } => FailureKind::TransientNetwork,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Conflict { .. } => FailureKind::Conflict,
            Self::Auth { .. } => FailureKind::Auth,
            Self::Http { .. } => FailureKind::Http,
            Self::Transcoding(_) => FailureKind::Transcoding,
            Self::Resolution(_) => FailureKind::Resolution,
            Self::Metadata(_) => FailureKind::Metadata,
        }
    }

    /// Classify a non-success response.
    pub fn from_response(response: &RemoteResponse) -> Self {
        let status = response.status;
        let message = parse_api_error(status, &response.body);
        match status {
            429 => Self::RateLimited {
                message,
                retry_after: response.retry_after,
            },
            401 | 403 => Self::Auth { status, message },
            409 => Self::Conflict { status, message },
            408 | 500..=599 => Self::TransientNetwork {
                message,
                status: Some(status),
            },
            _ => Self::Http { status, message },
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        Self::TransientNetwork {
            message: error.to_string(),
            status: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: u16, body: &[u8]) -> String {
    if let Ok(payload) = serde_json::from_slice::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({status})", message.trim());
        }
    }

    let text = String::from_utf8_lossy(body);
    let trimmed = compact_text(&text);
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("{trimmed} ({status})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(status: u16, body: &str) -> RemoteResponse {
        RemoteResponse {
            status,
            retry_after: None,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn statuses_map_to_failure_classes() {
        let cases = [
            (429, FailureKind::RateLimited, true),
            (401, FailureKind::Auth, false),
            (403, FailureKind::Auth, false),
            (409, FailureKind::Conflict, false),
            (408, FailureKind::TransientNetwork, true),
            (500, FailureKind::TransientNetwork, true),
            (503, FailureKind::TransientNetwork, true),
            (400, FailureKind::Http, false),
            (404, FailureKind::Http, false),
        ];

        for (status, kind, retryable) in cases {
            let error = SyncError::from_response(&response(status, ""));
            assert_eq!(error.kind(), kind, "status {status}");
            assert_eq!(error.is_retryable(), retryable, "status {status}");
            assert_eq!(error.status(), Some(status));
        }
    }

    #[test]
    fn api_error_prefers_json_message_then_error_then_body() {
        assert_eq!(
            parse_api_error(400, br#"{"message":" bad id ","error":"ignored"}"#),
            "bad id (400)"
        );
        assert_eq!(parse_api_error(401, br#"{"error":"expired"}"#), "expired (401)");
        assert_eq!(parse_api_error(502, b" upstream down \n"), "upstream down (502)");
        assert_eq!(parse_api_error(500, b"   "), "HTTP 500");
    }

    #[test]
    fn rate_limit_carries_server_delay() {
        let mut limited = response(429, "slow down");
        limited.retry_after = Some(Duration::from_secs(3));

        let error = SyncError::from_response(&limited);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn transport_failures_are_transient() {
        let error = SyncError::from(TransportError::Timeout(Duration::from_secs(8)));
        assert!(error.is_retryable());
        assert_eq!(error.status(), None);
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn domain_failures_are_not_retried() {
        let error = SyncError::from(TranscodeError::MissingEndOfImage);
        assert!(!error.is_retryable());
        assert_eq!(error.kind(), FailureKind::Transcoding);

        let error = SyncError::from(ResolutionError::UnknownStrategy("x".to_string()));
        assert!(!error.is_retryable());
        assert_eq!(error.kind(), FailureKind::Resolution);
    }
}
