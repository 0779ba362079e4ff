//! Aggregation rules - the three pluggable policies of an aggregator
//!
//! An aggregator is configured by composition with one [`AggregationRules`]
//! value supplying:
//! - **merge**: combine a newly delivered value with the one already held
//! - **is_complete**: decide from the held state whether to publish now
//! - **aggregate**: derive the published value from the held state
//!
//! Implement the trait on your own type, or build one from closures with
//! [`FnRules`]. Stock merge strategies live in [`strategy`].

mod closure;
pub mod strategy;

pub use closure::FnRules;
pub use strategy::{Append, CheckedSum, Max, MergeStrategy, Overwrite, Sum};

use crate::store::HoldStore;
use crate::tag::TagDomain;

/// The capability an aggregator is built from
///
/// All three methods see the hold store through a shared borrow and should be
/// free of side effects. Errors are returned to whoever called `submit`.
pub trait AggregationRules: Send + 'static {
    /// Producer discriminator
    type Tag: TagDomain;

    /// Partial value delivered by a producer
    type Value: Send + 'static;

    /// Value published to the sink
    type Output: Send + 'static;

    /// Combine `new` with the value already held for `tag`
    ///
    /// Only called when a value is held; the first delivery for a tag is
    /// stored as-is.
    fn merge(&self, tag: Self::Tag, old: &Self::Value, new: Self::Value) -> eyre::Result<Self::Value>;

    /// Whether the held state is ready to publish
    ///
    /// Must cope with missing tags. Need not be monotonic.
    fn is_complete(&self, held: &HoldStore<Self::Tag, Self::Value>) -> eyre::Result<bool>;

    /// Derive the value to publish; called only right after `is_complete`
    /// returned true for the same state
    fn aggregate(&self, held: &HoldStore<Self::Tag, Self::Value>) -> eyre::Result<Self::Output>;
}

/// Completeness predicate: every tag of the domain has been delivered
pub fn all_present<D: TagDomain, S>(held: &HoldStore<D, S>) -> bool {
    held.contains_all(D::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Pair {
        Left,
        Right,
    }

    impl TagDomain for Pair {
        const ALL: &'static [Self] = &[Pair::Left, Pair::Right];
    }

    #[test]
    fn test_all_present() {
        let mut held = HoldStore::<Pair, u8>::new();
        assert!(!all_present(&held));

        held.insert(Pair::Left, 1);
        assert!(!all_present(&held));

        held.insert(Pair::Right, 2);
        assert!(all_present(&held));
    }
}
