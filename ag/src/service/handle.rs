//! AggregatorHandle - producer-side interface to the service

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::AggregatorRequest;
use crate::engine::{AggregatorMetrics, Phase, Submission};
use crate::error::AggregatorError;

/// Handle for producers to submit deliveries
///
/// Cheap to clone; give one to each producer. Every call goes through the
/// service's single request queue, so submits are applied one at a time.
pub struct AggregatorHandle<D, S> {
    tx: mpsc::Sender<AggregatorRequest<D, S>>,
}

impl<D, S> Clone for AggregatorHandle<D, S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<D, S> AggregatorHandle<D, S>
where
    D: std::fmt::Debug,
{
    pub(crate) fn new(tx: mpsc::Sender<AggregatorRequest<D, S>>) -> Self {
        debug!("AggregatorHandle::new: called");
        Self { tx }
    }

    /// Deliver one (possibly absent) value and wait for the outcome
    ///
    /// Resolves after any resulting publish has reached the sink.
    pub async fn submit(&self, tag: D, value: Option<S>) -> Result<Submission, AggregatorError> {
        debug!(?tag, present = value.is_some(), "AggregatorHandle::submit: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(AggregatorRequest::Submit {
                tag,
                value,
                reply: reply_tx,
            })
            .await
            .map_err(|_| AggregatorError::ChannelClosed)?;

        reply_rx.await.map_err(|_| AggregatorError::ChannelClosed)?
    }

    /// Get current aggregator metrics
    pub async fn metrics(&self) -> Result<AggregatorMetrics, AggregatorError> {
        debug!("AggregatorHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(AggregatorRequest::GetMetrics { reply: reply_tx })
            .await
            .map_err(|_| AggregatorError::ChannelClosed)?;

        reply_rx.await.map_err(|_| AggregatorError::ChannelClosed)
    }

    pub async fn phase(&self) -> Result<Phase, AggregatorError> {
        debug!("AggregatorHandle::phase: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(AggregatorRequest::GetPhase { reply: reply_tx })
            .await
            .map_err(|_| AggregatorError::ChannelClosed)?;

        reply_rx.await.map_err(|_| AggregatorError::ChannelClosed)
    }

    /// Ask the service task to stop
    pub async fn shutdown(&self) -> Result<(), AggregatorError> {
        debug!("AggregatorHandle::shutdown: called");
        self.tx
            .send(AggregatorRequest::Shutdown)
            .await
            .map_err(|_| AggregatorError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
