//! FnRules - rules assembled from a merge strategy and two closures

use std::marker::PhantomData;

use super::AggregationRules;
use super::strategy::MergeStrategy;
use crate::store::HoldStore;
use crate::tag::TagDomain;

/// [`AggregationRules`] built from parts
///
/// `complete` is an infallible predicate; implement [`AggregationRules`]
/// directly when the predicate itself can fail.
///
/// ```rust
/// use aggregator::rules::{FnRules, Sum, all_present};
/// use aggregator::{HoldStore, TagDomain};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Part { A, B }
///
/// impl TagDomain for Part {
///     const ALL: &'static [Self] = &[Part::A, Part::B];
/// }
///
/// let rules = FnRules::new(
///     Sum,
///     all_present::<Part, i64>,
///     |held: &HoldStore<Part, i64>| -> eyre::Result<i64> { Ok(held.iter().map(|(_, v)| v).sum()) },
/// );
/// # let _ = rules;
/// ```
pub struct FnRules<D, S, T, M, C, A> {
    merge: M,
    complete: C,
    aggregate: A,
    _marker: PhantomData<fn() -> (D, S, T)>,
}

impl<D, S, T, M, C, A> FnRules<D, S, T, M, C, A>
where
    D: TagDomain,
    S: Send + 'static,
    T: Send + 'static,
    M: MergeStrategy<D, S>,
    C: Fn(&HoldStore<D, S>) -> bool + Send + 'static,
    A: Fn(&HoldStore<D, S>) -> eyre::Result<T> + Send + 'static,
{
    pub fn new(merge: M, complete: C, aggregate: A) -> Self {
        Self {
            merge,
            complete,
            aggregate,
            _marker: PhantomData,
        }
    }
}

impl<D, S, T, M, C, A> AggregationRules for FnRules<D, S, T, M, C, A>
where
    D: TagDomain,
    S: Send + 'static,
    T: Send + 'static,
    M: MergeStrategy<D, S>,
    C: Fn(&HoldStore<D, S>) -> bool + Send + 'static,
    A: Fn(&HoldStore<D, S>) -> eyre::Result<T> + Send + 'static,
{
    type Tag = D;
    type Value = S;
    type Output = T;

    fn merge(&self, tag: D, old: &S, new: S) -> eyre::Result<S> {
        self.merge.merge(tag, old, new)
    }

    fn is_complete(&self, held: &HoldStore<D, S>) -> eyre::Result<bool> {
        Ok((self.complete)(held))
    }

    fn aggregate(&self, held: &HoldStore<D, S>) -> eyre::Result<T> {
        (self.aggregate)(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Overwrite, all_present};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Pair {
        Left,
        Right,
    }

    impl TagDomain for Pair {
        const ALL: &'static [Self] = &[Pair::Left, Pair::Right];
    }

    fn concat(held: &HoldStore<Pair, String>) -> eyre::Result<String> {
        let left = held.get(Pair::Left).ok_or_else(|| eyre::eyre!("left missing"))?;
        let right = held.get(Pair::Right).ok_or_else(|| eyre::eyre!("right missing"))?;
        Ok(format!("{left}{right}"))
    }

    #[test]
    fn test_fn_rules_delegate() {
        let rules = FnRules::new(Overwrite, all_present::<Pair, String>, concat);

        let mut held = HoldStore::new();
        held.insert(Pair::Left, "a".to_string());
        assert!(!rules.is_complete(&held).unwrap());
        assert!(rules.aggregate(&held).is_err());

        held.insert(Pair::Right, "b".to_string());
        assert!(rules.is_complete(&held).unwrap());
        assert_eq!(rules.aggregate(&held).unwrap(), "ab");

        let merged = rules.merge(Pair::Left, &"a".to_string(), "z".to_string()).unwrap();
        assert_eq!(merged, "z");
    }
}
