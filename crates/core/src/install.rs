//! Typed result of the install-time precache.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A manifest URL that could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of populating the active store from the manifest.
///
/// Precache is all-or-nothing: on `Failed` nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrecacheOutcome {
    Complete { cached: usize },
    Failed { failures: Vec<PrecacheFailure> },
}

impl PrecacheOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, PrecacheOutcome::Complete { .. })
    }

    pub fn failures(&self) -> &[PrecacheFailure] {
        match self {
            PrecacheOutcome::Complete { .. } => &[],
            PrecacheOutcome::Failed { failures } => failures,
        }
    }
}

/// Decides whether a failed precache blocks activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPolicy {
    /// When false, a failed precache is logged and the instance still
    /// becomes eligible for activation.
    pub require_precache: bool,
}

impl InstallPolicy {
    pub fn accepts(&self, outcome: &PrecacheOutcome) -> bool {
        outcome.is_complete() || !self.require_precache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> PrecacheOutcome {
        PrecacheOutcome::Failed {
            failures: vec![PrecacheFailure { url: "https://app.reelmind.ai/icon-512.png".into(), reason: "status 404".into() }],
        }
    }

    #[test]
    fn test_best_effort_policy_accepts_failure() {
        let policy = InstallPolicy::default();
        assert!(policy.accepts(&failed()));
        assert!(policy.accepts(&PrecacheOutcome::Complete { cached: 4 }));
    }

    #[test]
    fn test_strict_policy_rejects_failure() {
        let policy = InstallPolicy { require_precache: true };
        assert!(!policy.accepts(&failed()));
        assert!(policy.accepts(&PrecacheOutcome::Complete { cached: 0 }));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(PrecacheOutcome::Complete { cached: 2 }).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["cached"], 2);
        assert_eq!(failed().failures().len(), 1);
    }
}
