//! Message types for the aggregator service

use tokio::sync::oneshot;

use crate::engine::{AggregatorMetrics, Phase, Submission};
use crate::error::AggregatorError;

/// Requests to the aggregator service task
#[derive(Debug)]
pub enum AggregatorRequest<D, S> {
    /// Deliver one (possibly absent) value
    Submit {
        tag: D,
        value: Option<S>,
        reply: oneshot::Sender<Result<Submission, AggregatorError>>,
    },

    /// Get current metrics
    GetMetrics { reply: oneshot::Sender<AggregatorMetrics> },

    /// Get the current phase
    GetPhase { reply: oneshot::Sender<Phase> },

    /// Stop the service task
    Shutdown,
}
