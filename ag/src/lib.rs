//! Aggregator - join partial results and publish when complete
//!
//! Many producers deliver partial results independently, each tagged with a
//! member of a small closed domain. The aggregator holds the latest (merged)
//! value per tag and, whenever a completeness rule approves the held state,
//! publishes one derived value to a sink.
//!
//! # Core Concepts
//!
//! - **Tag domain**: a fieldless enum implementing [`TagDomain`]
//! - **Hold store**: sparse tag → value map ([`HoldStore`])
//! - **Rules**: merge / completeness / aggregate, supplied as one
//!   [`AggregationRules`] value
//! - **Sink**: where published values go ([`Sink`]; usually a [`LatestValue`])
//! - **Serialized submits**: [`Aggregator`] (mutex) or [`AggregatorService`]
//!   (single task fed by a channel)
//!
//! # Modules
//!
//! - [`engine`] - the submit pipeline and the mutex-guarded aggregator
//! - [`service`] - actor flavour with cloneable producer handles
//! - [`rules`] - the rules trait, stock merge strategies, closure-built rules
//! - [`sink`] - sink trait and adapters
//! - [`scenario`] - YAML replay scenarios used by the `ag` binary
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use aggregator::{Aggregator, AggregationRules, HoldStore, LatestValue, TagDomain};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Part { A, B }
//!
//! impl TagDomain for Part {
//!     const ALL: &'static [Self] = &[Part::A, Part::B];
//! }
//!
//! struct Total;
//!
//! impl AggregationRules for Total {
//!     type Tag = Part;
//!     type Value = i64;
//!     type Output = i64;
//!
//!     fn merge(&self, tag: Part, old: &i64, new: i64) -> eyre::Result<i64> {
//!         Ok(match tag {
//!             Part::A => old + new,
//!             Part::B => new,
//!         })
//!     }
//!
//!     fn is_complete(&self, held: &HoldStore<Part, i64>) -> eyre::Result<bool> {
//!         Ok(held.contains_all(Part::ALL))
//!     }
//!
//!     fn aggregate(&self, held: &HoldStore<Part, i64>) -> eyre::Result<i64> {
//!         Ok(held.iter().map(|(_, v)| v).sum())
//!     }
//! }
//!
//! let sink = Arc::new(LatestValue::<i64>::new());
//! let agg = Aggregator::new(Total, Arc::clone(&sink));
//!
//! agg.submit(Part::A, Some(5)).unwrap();
//! assert_eq!(sink.get(), None);
//! agg.submit(Part::B, Some(3)).unwrap();
//! assert_eq!(sink.get(), Some(8));
//! agg.submit(Part::A, Some(2)).unwrap();
//! assert_eq!(sink.get(), Some(10));
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod rules;
pub mod scenario;
pub mod service;
pub mod sink;
pub mod store;
pub mod tag;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Aggregator, AggregatorMetrics, Phase, PublishPolicy, Submission};
pub use error::{AggregatorError, RuleStage};
pub use latestvalue::{LatestValue, Subscription};
pub use rules::{AggregationRules, FnRules, MergeStrategy, all_present};
pub use service::{AggregatorConfig, AggregatorHandle, AggregatorRequest, AggregatorService};
pub use sink::{RecordingSink, Sink};
pub use store::HoldStore;
pub use tag::TagDomain;
