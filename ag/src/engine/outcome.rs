//! Outcome, phase, policy and metrics types for the engine

use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a single `submit` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Submission {
    /// The value was absent; nothing changed
    Ignored,

    /// Stored; the completeness rule said not yet
    Held { merged: bool },

    /// Stored, complete, and one value was published
    Published { merged: bool },

    /// Stored and complete, but the publish policy withheld the publish
    Suppressed { merged: bool },
}

impl Submission {
    pub fn is_published(&self) -> bool {
        matches!(self, Submission::Published { .. })
    }

    /// Whether the merge rule ran for this submit
    pub fn merged(&self) -> bool {
        match self {
            Submission::Ignored => false,
            Submission::Held { merged } | Submission::Published { merged } | Submission::Suppressed { merged } => {
                *merged
            }
        }
    }
}

/// Conceptual state of an aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Nothing held yet
    #[default]
    Empty,

    /// Something held; completeness last evaluated false (or publishing failed)
    PartiallyFilled,

    /// Completeness last evaluated true
    Published,
}

/// When a true completeness evaluation leads to a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishPolicy {
    /// Publish on every true evaluation, including repeats
    #[default]
    Always,

    /// Publish only when completeness turns true after being false
    OnTransition,
}

impl PublishPolicy {
    /// Decide for a true evaluation, given the phase before this submit
    pub fn should_publish(&self, previous: Phase) -> bool {
        debug!(policy = ?self, ?previous, "PublishPolicy::should_publish: called");
        match self {
            PublishPolicy::Always => true,
            PublishPolicy::OnTransition => previous != Phase::Published,
        }
    }
}

/// Aggregator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorMetrics {
    pub submissions: u64,
    pub ignored: u64,
    pub merges: u64,
    pub publishes: u64,
    pub suppressed: u64,
    pub rule_failures: u64,
    pub held_tags: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_publishes() {
        let policy = PublishPolicy::Always;
        assert!(policy.should_publish(Phase::Empty));
        assert!(policy.should_publish(Phase::PartiallyFilled));
        assert!(policy.should_publish(Phase::Published));
    }

    #[test]
    fn test_on_transition_skips_repeat() {
        let policy = PublishPolicy::OnTransition;
        assert!(policy.should_publish(Phase::Empty));
        assert!(policy.should_publish(Phase::PartiallyFilled));
        assert!(!policy.should_publish(Phase::Published));
    }

    #[test]
    fn test_policy_serialization() {
        let policy: PublishPolicy = serde_yaml::from_str("on-transition").unwrap();
        assert_eq!(policy, PublishPolicy::OnTransition);
        assert_eq!(PublishPolicy::default(), PublishPolicy::Always);
    }

    #[test]
    fn test_submission_merged() {
        assert!(!Submission::Ignored.merged());
        assert!(Submission::Held { merged: true }.merged());
        assert!(Submission::Published { merged: false }.is_published());
        assert!(!Submission::Suppressed { merged: false }.is_published());
    }
}
