//! Aggregate result of a sync submission

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a per-record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    TransientNetwork,
    RateLimited,
    Conflict,
    Auth,
    Http,
    Transcoding,
    Resolution,
    Metadata,
}

/// A record the remote endpoint accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRecord {
    /// Record identifier
    pub id: String,
    /// Matching element of the remote response, when one could be paired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// A record that could not be applied (or whose side effect failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    /// Record identifier, or `record[N]` for entries without a usable id
    pub id: String,
    pub kind: FailureKind,
    /// Human-readable message of the underlying error
    pub error: String,
    /// HTTP-equivalent status when the failure came from the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Aggregate result of one `sync` call.
///
/// `applied.len() + errors.len()` always equals the number of submitted
/// entries. Metadata side-effect failures are listed separately because
/// their records were applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub applied: Vec<AppliedRecord>,
    pub errors: Vec<SyncFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_failures: Vec<SyncFailure>,
}

impl SyncOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty() && self.metadata_failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.applied.len() + self.errors.len()
    }

    /// Ids the remote rejected with a conflict-class status.
    pub fn conflicted_ids(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|failure| failure.kind == FailureKind::Conflict)
            .map(|failure| failure.id.as_str())
            .collect()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.errors.iter().map(|failure| failure.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(id: &str, kind: FailureKind) -> SyncFailure {
        SyncFailure {
            id: id.to_string(),
            kind,
            error: "boom".to_string(),
            status: None,
        }
    }

    #[test]
    fn conflicted_ids_only_lists_conflicts() {
        let outcome = SyncOutcome {
            applied: vec![AppliedRecord {
                id: "a".to_string(),
                result: None,
            }],
            errors: vec![
                failure("b", FailureKind::Conflict),
                failure("c", FailureKind::TransientNetwork),
            ],
            metadata_failures: Vec::new(),
        };

        assert_eq!(outcome.conflicted_ids(), vec!["b"]);
        assert_eq!(outcome.failed_ids(), vec!["b", "c"]);
        assert_eq!(outcome.total(), 3);
        assert!(!outcome.is_complete_success());
    }

    #[test]
    fn metadata_failures_break_complete_success() {
        let outcome = SyncOutcome {
            applied: vec![AppliedRecord {
                id: "a".to_string(),
                result: None,
            }],
            errors: Vec::new(),
            metadata_failures: vec![failure("a", FailureKind::Metadata)],
        };
        assert!(!outcome.is_complete_success());
        assert_eq!(outcome.total(), 1);
    }

    #[test]
    fn outcome_json_uses_snake_case_kinds() {
        let outcome = SyncOutcome {
            applied: Vec::new(),
            errors: vec![failure("x", FailureKind::RateLimited)],
            metadata_failures: Vec::new(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"rate_limited\""));
        assert!(!json.contains("metadata_failures"));
    }
}
