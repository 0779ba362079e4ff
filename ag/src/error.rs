//! Aggregator error types

use std::fmt;

use thiserror::Error;

/// Which rule failed during a submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStage {
    Merge,
    Completeness,
    Aggregate,
}

impl fmt::Display for RuleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleStage::Merge => "merge",
            RuleStage::Completeness => "completeness",
            RuleStage::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

/// Errors surfaced to the caller of `submit`
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("{stage} rule failed: {source}")]
    Rule {
        stage: RuleStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Sink panicked while publishing: {0}")]
    SinkPanicked(String),

    #[error("Aggregator channel closed")]
    ChannelClosed,
}

impl AggregatorError {
    pub(crate) fn rule(stage: RuleStage, report: eyre::Report) -> Self {
        Self::Rule {
            stage,
            source: report.into(),
        }
    }

    /// The failing rule, if this is a rule failure
    pub fn stage(&self) -> Option<RuleStage> {
        match self {
            Self::Rule { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
