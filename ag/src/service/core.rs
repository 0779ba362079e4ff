//! Aggregator service task implementation

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::AggregatorConfig;
use super::handle::AggregatorHandle;
use super::messages::AggregatorRequest;
use crate::engine::JoinCore;
use crate::rules::AggregationRules;
use crate::sink::Sink;

type Request<R> = AggregatorRequest<<R as AggregationRules>::Tag, <R as AggregationRules>::Value>;

/// Aggregation coordinator run as a single-consumer task
///
/// Producers submit through [`AggregatorHandle`]s; the task owns the hold
/// store and applies requests strictly one after another, publishing from
/// inside the same step that evaluated completeness.
pub struct AggregatorService<R, K>
where
    R: AggregationRules,
    K: Sink<R::Output> + ?Sized,
{
    tx: mpsc::Sender<Request<R>>,
    rx: mpsc::Receiver<Request<R>>,
    core: JoinCore<R, K>,
}

impl<R, K> AggregatorService<R, K>
where
    R: AggregationRules,
    K: Sink<R::Output> + ?Sized + 'static,
{
    /// Create a new service with the given configuration
    pub fn new(rules: R, sink: Arc<K>, config: AggregatorConfig) -> Self {
        debug!(?config, "AggregatorService::new: called");
        if let Err(e) = config.validate() {
            warn!(error = %e, "AggregatorService::new: using a single-slot queue");
        }
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        Self {
            tx,
            rx,
            core: JoinCore::new(rules, sink, config.publish_policy),
        }
    }

    /// Create a handle for a producer
    pub fn handle(&self) -> AggregatorHandle<R::Tag, R::Value> {
        AggregatorHandle::new(self.tx.clone())
    }

    /// Run the service task
    ///
    /// Consumes the service and runs until a shutdown request arrives or
    /// every handle has been dropped.
    pub async fn run(self) {
        let Self { tx, mut rx, mut core } = self;
        // Only handles keep the queue open from here on
        drop(tx);

        info!("Aggregator service started");

        while let Some(req) = rx.recv().await {
            match req {
                AggregatorRequest::Submit { tag, value, reply } => {
                    let result = core.submit(tag, value);
                    if let Err(ref e) = result {
                        debug!(?tag, error = %e, "Submit failed");
                    }
                    if reply.send(result).is_err() {
                        warn!(?tag, "Submitter went away before the reply");
                    }
                }

                AggregatorRequest::GetMetrics { reply } => {
                    let _ = reply.send(core.metrics());
                }

                AggregatorRequest::GetPhase { reply } => {
                    let _ = reply.send(core.phase());
                }

                AggregatorRequest::Shutdown => {
                    info!("Aggregator service shutting down");
                    break;
                }
            }
        }

        info!(metrics = ?core.metrics(), "Aggregator service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Phase, PublishPolicy, Submission};
    use crate::error::{AggregatorError, RuleStage};
    use crate::rules::{FnRules, Sum, all_present};
    use crate::sink::RecordingSink;
    use crate::store::HoldStore;
    use crate::tag::TagDomain;
    use latestvalue::LatestValue;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Feed {
        Local,
        Remote,
    }

    impl TagDomain for Feed {
        const ALL: &'static [Self] = &[Feed::Local, Feed::Remote];
    }

    fn total(held: &HoldStore<Feed, i64>) -> eyre::Result<i64> {
        Ok(held.iter().map(|(_, v)| *v).sum())
    }

    #[tokio::test]
    async fn test_service_publishes_when_complete() {
        let sink = Arc::new(RecordingSink::new());
        let rules = FnRules::new(Sum, all_present::<Feed, i64>, total);
        let service = AggregatorService::new(rules, Arc::clone(&sink), AggregatorConfig::default());
        let handle = service.handle();
        let task = tokio::spawn(service.run());

        assert_eq!(
            handle.submit(Feed::Local, Some(5)).await.unwrap(),
            Submission::Held { merged: false }
        );
        assert!(handle.submit(Feed::Remote, Some(3)).await.unwrap().is_published());
        assert_eq!(sink.values(), vec![8]);
        assert_eq!(handle.phase().await.unwrap(), Phase::Published);

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service should stop")
            .unwrap();
        assert!(matches!(
            handle.submit(Feed::Local, Some(1)).await,
            Err(AggregatorError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_service_stops_when_handles_dropped() {
        let rules = FnRules::new(Sum, all_present::<Feed, i64>, total);
        let service = AggregatorService::new(rules, Arc::new(RecordingSink::new()), AggregatorConfig::default());
        let handle = service.handle();
        let task = tokio::spawn(service.run());

        handle.submit(Feed::Local, None).await.unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_rule_error_reaches_submitter() {
        let rules = FnRules::new(
            |_tag: Feed, _old: &i64, _new: i64| -> eyre::Result<i64> { Err(eyre::eyre!("refused")) },
            all_present::<Feed, i64>,
            total,
        );
        let service = AggregatorService::new(rules, Arc::new(RecordingSink::new()), AggregatorConfig::default());
        let handle = service.handle();
        tokio::spawn(service.run());

        handle.submit(Feed::Local, Some(1)).await.unwrap();
        let err = handle.submit(Feed::Local, Some(2)).await.unwrap_err();
        assert_eq!(err.stage(), Some(RuleStage::Merge));

        // The service keeps going after a rule failure
        assert!(handle.submit(Feed::Remote, Some(2)).await.unwrap().is_published());
        assert_eq!(handle.metrics().await.unwrap().rule_failures, 1);
    }

    #[tokio::test]
    async fn test_panicking_rule_keeps_service_alive() {
        let rules = FnRules::new(Sum, all_present::<Feed, i64>, |held: &HoldStore<Feed, i64>| -> eyre::Result<i64> {
            let local = held.get(Feed::Local).copied().unwrap_or_default();
            assert!(local != 7, "local may not be 7");
            total(held)
        });
        let sink = Arc::new(RecordingSink::new());
        let service = AggregatorService::new(rules, Arc::clone(&sink), AggregatorConfig::default());
        let handle = service.handle();
        let task = tokio::spawn(service.run());

        // Sum overflow on one producer, an aggregate panic on another
        handle.submit(Feed::Local, Some(i64::MAX)).await.unwrap();
        let other = handle.clone();
        let err = tokio::spawn(async move { other.submit(Feed::Local, Some(1)).await })
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.stage(), Some(RuleStage::Merge));

        handle.submit(Feed::Local, Some(i64::MIN)).await.unwrap();
        handle.submit(Feed::Local, Some(8)).await.unwrap();
        let err = handle.submit(Feed::Remote, Some(0)).await.unwrap_err();
        assert_eq!(err.stage(), Some(RuleStage::Aggregate));
        assert!(err.to_string().contains("local may not be 7"));

        assert!(handle.submit(Feed::Local, Some(1)).await.unwrap().is_published());
        assert_eq!(sink.values(), vec![8]);
        assert!(!task.is_finished());
        assert_eq!(handle.metrics().await.unwrap().rule_failures, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_through_handles() {
        let channel = Arc::new(LatestValue::<i64>::new());
        let rules = FnRules::new(Sum, all_present::<Feed, i64>, total);
        let config = AggregatorConfig {
            publish_policy: PublishPolicy::Always,
            channel_buffer: 8,
        };
        let service = AggregatorService::new(rules, Arc::clone(&channel), config);
        let handle = service.handle();
        tokio::spawn(service.run());

        let mut producers = Vec::new();
        for i in 0..20 {
            let handle = handle.clone();
            let tag = if i % 2 == 0 { Feed::Local } else { Feed::Remote };
            producers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    handle.submit(tag, Some(1)).await.unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        // Every delivery counted once, last publish saw all of them
        assert_eq!(channel.get(), Some(1_000));
        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.submissions, 1_000);
        assert_eq!(metrics.merges, 998);
        assert_eq!(metrics.held_tags, 2);
    }

    #[tokio::test]
    async fn test_on_transition_config() {
        let sink = Arc::new(RecordingSink::new());
        let rules = FnRules::new(Sum, all_present::<Feed, i64>, total);
        let config = AggregatorConfig {
            publish_policy: PublishPolicy::OnTransition,
            ..Default::default()
        };
        let service = AggregatorService::new(rules, Arc::clone(&sink), config);
        let handle = service.handle();
        tokio::spawn(service.run());

        handle.submit(Feed::Local, Some(1)).await.unwrap();
        handle.submit(Feed::Remote, Some(1)).await.unwrap();
        assert_eq!(
            handle.submit(Feed::Remote, Some(1)).await.unwrap(),
            Submission::Suppressed { merged: true }
        );
        assert_eq!(sink.values(), vec![2]);
    }
}
