//! Aggregation engine
//!
//! The engine joins partial deliveries from many producers:
//! submit → merge/store → completeness check → aggregate → publish.
//! [`Aggregator`] serializes submits with a mutex; the actor flavour lives in
//! [`crate::service`].

mod core;
mod outcome;

pub(crate) use self::core::JoinCore;
pub use self::core::Aggregator;
pub use outcome::{AggregatorMetrics, Phase, PublishPolicy, Submission};
