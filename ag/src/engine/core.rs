//! JoinCore and the mutex-guarded Aggregator

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::outcome::{AggregatorMetrics, Phase, PublishPolicy, Submission};
use crate::error::{AggregatorError, RuleStage};
use crate::rules::AggregationRules;
use crate::sink::Sink;
use crate::store::HoldStore;

/// Hold store plus everything needed to run one submit
///
/// Not synchronized itself: `Aggregator` wraps it in a mutex and the
/// service actor owns it outright. A panic in a rule or the sink is caught
/// and returned from `submit`; the store is consistent at every such point,
/// so the core keeps accepting submits afterwards.
pub(crate) struct JoinCore<R, K>
where
    R: AggregationRules,
    K: Sink<R::Output> + ?Sized,
{
    rules: R,
    sink: Arc<K>,
    policy: PublishPolicy,
    held: HoldStore<R::Tag, R::Value>,
    phase: Phase,
    metrics: AggregatorMetrics,
}

impl<R, K> JoinCore<R, K>
where
    R: AggregationRules,
    K: Sink<R::Output> + ?Sized,
{
    pub(crate) fn new(rules: R, sink: Arc<K>, policy: PublishPolicy) -> Self {
        debug!(?policy, "JoinCore::new: called");
        Self {
            rules,
            sink,
            policy,
            held: HoldStore::new(),
            phase: Phase::Empty,
            metrics: AggregatorMetrics::default(),
        }
    }

    /// Store (or merge) one delivery, then publish if the state is complete
    pub(crate) fn submit(&mut self, tag: R::Tag, value: Option<R::Value>) -> Result<Submission, AggregatorError> {
        self.metrics.submissions += 1;

        let Some(value) = value else {
            debug!(?tag, "JoinCore::submit: absent value ignored");
            self.metrics.ignored += 1;
            return Ok(Submission::Ignored);
        };

        let merged = match self.held.get(tag) {
            Some(old) => {
                debug!(?tag, "JoinCore::submit: merging with held value");
                let rules = &self.rules;
                let result = guarded(|| rules.merge(tag, old, value));
                let new = self.check(RuleStage::Merge, result)?;
                self.held.insert(tag, new);
                self.metrics.merges += 1;
                true
            }
            None => {
                debug!(?tag, "JoinCore::submit: first delivery for tag");
                self.held.insert(tag, value);
                false
            }
        };
        self.metrics.held_tags = self.held.len();

        let result = guarded(|| self.rules.is_complete(&self.held));
        if !self.check(RuleStage::Completeness, result)? {
            debug!(?tag, held = self.held.len(), "JoinCore::submit: not complete");
            self.phase = Phase::PartiallyFilled;
            return Ok(Submission::Held { merged });
        }

        let previous = self.phase;
        self.phase = Phase::Published;
        if !self.policy.should_publish(previous) {
            debug!(?tag, "JoinCore::submit: complete, publish suppressed by policy");
            self.metrics.suppressed += 1;
            return Ok(Submission::Suppressed { merged });
        }

        let result = guarded(|| self.rules.aggregate(&self.held));
        let output = match self.check(RuleStage::Aggregate, result) {
            Ok(output) => output,
            Err(e) => {
                // Nothing reached the sink
                self.phase = Phase::PartiallyFilled;
                return Err(e);
            }
        };

        debug!(?tag, "JoinCore::submit: publishing");
        let sink = &self.sink;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.publish(output))) {
            let message = panic_message(payload.as_ref()).to_string();
            warn!(?tag, %message, "JoinCore::submit: sink panicked");
            return Err(AggregatorError::SinkPanicked(message));
        }
        self.metrics.publishes += 1;
        Ok(Submission::Published { merged })
    }

    fn check<T>(&mut self, stage: RuleStage, result: eyre::Result<T>) -> Result<T, AggregatorError> {
        result.map_err(|e| {
            debug!(%stage, error = %e, "JoinCore::check: rule failed");
            self.metrics.rule_failures += 1;
            AggregatorError::rule(stage, e)
        })
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn metrics(&self) -> AggregatorMetrics {
        self.metrics.clone()
    }

    pub(crate) fn held(&self) -> &HoldStore<R::Tag, R::Value> {
        &self.held
    }
}

/// Run one rule, turning a panic into an ordinary rule error
fn guarded<T>(rule: impl FnOnce() -> eyre::Result<T>) -> eyre::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(rule))
        .unwrap_or_else(|payload| Err(eyre::eyre!("rule panicked: {}", panic_message(payload.as_ref()))))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Aggregation coordinator with a synchronous, mutex-serialized `submit`
///
/// Each `submit` holds the lock from the hold-store read through the publish,
/// so concurrent producers are applied in some sequential order and the
/// aggregate always sees exactly the state the completeness rule approved.
/// Share it across threads behind an `Arc`.
pub struct Aggregator<R, K>
where
    R: AggregationRules,
    K: Sink<R::Output> + ?Sized,
{
    core: Mutex<JoinCore<R, K>>,
}

impl<R, K> Aggregator<R, K>
where
    R: AggregationRules,
    K: Sink<R::Output> + ?Sized,
{
    /// Create an aggregator that publishes on every complete evaluation
    pub fn new(rules: R, sink: Arc<K>) -> Self {
        Self::with_policy(rules, sink, PublishPolicy::Always)
    }

    pub fn with_policy(rules: R, sink: Arc<K>, policy: PublishPolicy) -> Self {
        debug!(?policy, "Aggregator::with_policy: called");
        Self {
            core: Mutex::new(JoinCore::new(rules, sink, policy)),
        }
    }

    /// `JoinCore` catches rule and sink panics itself, so a poisoned lock
    /// still guards a consistent store.
    fn lock(&self) -> MutexGuard<'_, JoinCore<R, K>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one (possibly absent) value for `tag`
    ///
    /// When the completeness rule approves the resulting state, the aggregate
    /// is published to the sink before this returns. Rule failures, panics
    /// included, are returned as [`AggregatorError::Rule`] and affect only
    /// this call.
    pub fn submit(&self, tag: R::Tag, value: Option<R::Value>) -> Result<Submission, AggregatorError> {
        debug!(?tag, present = value.is_some(), "Aggregator::submit: called");
        self.lock().submit(tag, value)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase()
    }

    pub fn metrics(&self) -> AggregatorMetrics {
        self.lock().metrics()
    }

    /// Copy of the hold store
    pub fn snapshot(&self) -> HoldStore<R::Tag, R::Value>
    where
        R::Value: Clone,
    {
        self.lock().held().clone()
    }
}
