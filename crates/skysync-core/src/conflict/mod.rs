//! Conflict resolution between divergent local and remote record versions.
//!
//! Strategies are selected at call time through [`ConflictStrategy`]:
//!
//! - `last-write-wins`: keep the side with the newer `modificationDate`
//! - `merge`: deep-merge both sides, local values winning scalar conflicts
//! - `manual`: refuse and hand both versions back to the caller

mod last_write;
mod merge;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use last_write::{modification_date, MODIFICATION_DATE_FIELD};
pub use merge::MAX_MERGE_DEPTH;

/// Reconciliation strategy for a conflicting record pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    #[default]
    LastWriteWins,
    Merge,
    Manual,
}

impl ConflictStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastWriteWins => "last-write-wins",
            Self::Merge => "merge",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "last-write-wins" | "lww" | "local" => Ok(Self::LastWriteWins),
            "merge" => Ok(Self::Merge),
            "manual" => Ok(Self::Manual),
            _ => Err(ResolutionError::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Unknown conflict resolution strategy: {0}")]
    UnknownStrategy(String),
    #[error("Manual resolution required")]
    ManualResolutionRequired {
        /// Serialized local record
        local: String,
        /// Serialized remote record
        remote: String,
    },
    #[error("Record nesting exceeds {limit} levels; refusing to merge")]
    NestingTooDeep { limit: usize },
    #[error("Conflict resolution failed ({strategy}): {message}")]
    Failed {
        strategy: ConflictStrategy,
        message: String,
    },
}

impl ResolutionError {
    /// Failures raised while a strategy ran, as opposed to a rejected
    /// strategy name or a deliberate manual refusal.
    pub const fn is_internal_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::NestingTooDeep { .. })
    }
}

/// A conflicting `(local, remote)` pair awaiting reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictPair {
    pub local: Value,
    pub remote: Value,
    pub strategy: ConflictStrategy,
}

impl ConflictPair {
    pub fn new(local: Value, remote: Value) -> Self {
        Self {
            local,
            remote,
            strategy: ConflictStrategy::default(),
        }
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn resolve(self) -> Result<Value, ResolutionError> {
        resolve(&self.local, &self.remote, self.strategy)
    }
}

/// Reconcile two versions of the same record.
pub fn resolve(
    local: &Value,
    remote: &Value,
    strategy: ConflictStrategy,
) -> Result<Value, ResolutionError> {
    let result = match strategy {
        ConflictStrategy::LastWriteWins => Ok(last_write::last_write_wins(local, remote).clone()),
        ConflictStrategy::Merge => merge::merge_records(local, remote),
        ConflictStrategy::Manual => Err(manual_resolution_required(local, remote)),
    };

    result.map_err(|error| {
        let error = match error {
            ResolutionError::Failed { message, .. } => ResolutionError::Failed { strategy, message },
            other => other,
        };
        if error.is_internal_failure() {
            tracing::error!(strategy = %strategy, %error, "Conflict resolution failed");
        }
        error
    })
}

fn manual_resolution_required(local: &Value, remote: &Value) -> ResolutionError {
    ResolutionError::ManualResolutionRequired {
        local: local.to_string(),
        remote: remote.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn strategy_names_parse_and_default_to_last_write_wins() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::LastWriteWins);
        assert_eq!(
            "Last_Write_Wins".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::LastWriteWins
        );
        assert_eq!(
            "merge".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::Merge
        );
        assert_eq!(
            "manual".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::Manual
        );
    }

    #[test]
    fn unknown_strategy_is_an_input_error() {
        let err = "coin-flip".parse::<ConflictStrategy>().unwrap_err();
        match err {
            ResolutionError::UnknownStrategy(name) => assert_eq!(name, "coin-flip"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn manual_strategy_always_refuses_with_both_records() {
        let pairs = [
            (json!({"id": "1"}), json!({"id": "1", "v": 2})),
            (json!(null), json!([])),
            (json!({"a": 1}), json!({"a": 1})),
        ];

        for (local, remote) in pairs {
            let err = resolve(&local, &remote, ConflictStrategy::Manual).unwrap_err();
            match err {
                ResolutionError::ManualResolutionRequired {
                    local: local_json,
                    remote: remote_json,
                } => {
                    assert_eq!(local_json, local.to_string());
                    assert_eq!(remote_json, remote.to_string());
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn merge_failures_are_wrapped_with_strategy_name() {
        let err = resolve(&json!([1]), &json!({"a": 1}), ConflictStrategy::Merge).unwrap_err();
        match err {
            ResolutionError::Failed { strategy, message } => {
                assert_eq!(strategy, ConflictStrategy::Merge);
                assert!(message.contains("object"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn runaway_nesting_is_reported_as_an_internal_failure() {
        let mut deep = json!({"leaf": true});
        for _ in 0..MAX_MERGE_DEPTH + 5 {
            deep = json!({ "next": deep });
        }

        let err = resolve(&deep, &deep, ConflictStrategy::Merge).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::NestingTooDeep {
                limit: MAX_MERGE_DEPTH
            }
        ));
        assert!(err.is_internal_failure());
    }

    #[test]
    fn refusals_are_not_internal_failures() {
        assert!(!ResolutionError::UnknownStrategy("x".to_string()).is_internal_failure());
        assert!(!manual_resolution_required(&json!({}), &json!({})).is_internal_failure());
        assert!(ResolutionError::Failed {
            strategy: ConflictStrategy::Merge,
            message: "boom".to_string(),
        }
        .is_internal_failure());
    }

    #[test]
    fn conflict_pair_defaults_to_last_write_wins() {
        let local = json!({"id": "n1", "modificationDate": "2024-01-02T00:00:00Z"});
        let remote = json!({"id": "n1", "modificationDate": "2024-01-01T00:00:00Z"});

        let resolved = ConflictPair::new(local.clone(), remote).resolve().unwrap();
        assert_eq!(resolved, local);
    }

    #[test]
    fn conflict_pair_uses_selected_strategy() {
        let resolved = ConflictPair::new(json!({"a": 1, "b": 2}), json!({"b": 3, "c": 4}))
            .with_strategy(ConflictStrategy::Merge)
            .resolve()
            .unwrap();
        assert_eq!(resolved, json!({"a": 1, "b": 2, "c": 4}));
    }
}
