//! Aggregator service - actor flavour of the engine
//!
//! All submissions funnel through one task reading a bounded channel, so the
//! hold store needs no lock. Producers hold cloneable [`AggregatorHandle`]s
//! and get each submit's outcome (or rule error) back over a oneshot reply.

mod config;
mod core;
mod handle;
mod messages;

pub use self::core::AggregatorService;
pub use config::AggregatorConfig;
pub use handle::AggregatorHandle;
pub use messages::AggregatorRequest;
