//! Stock merge strategies

use std::fmt::Debug;

use crate::tag::TagDomain;

/// Combines a held value with a new delivery for the same tag
///
/// Implemented by the stock strategies below and by any
/// `Fn(D, &S, S) -> eyre::Result<S>`.
pub trait MergeStrategy<D, S>: Send + Sync + 'static {
    fn merge(&self, tag: D, old: &S, new: S) -> eyre::Result<S>;
}

impl<D, S, F> MergeStrategy<D, S> for F
where
    F: Fn(D, &S, S) -> eyre::Result<S> + Send + Sync + 'static,
{
    fn merge(&self, tag: D, old: &S, new: S) -> eyre::Result<S> {
        self(tag, old, new)
    }
}

/// Keep the latest delivery
#[derive(Debug, Clone, Copy, Default)]
pub struct Overwrite;

impl<D: TagDomain, S> MergeStrategy<D, S> for Overwrite {
    fn merge(&self, _tag: D, _old: &S, new: S) -> eyre::Result<S> {
        Ok(new)
    }
}

/// Addition that reports overflow instead of wrapping or panicking
pub trait CheckedSum: Sized + Debug {
    fn checked_sum(&self, other: &Self) -> Option<Self>;
}

macro_rules! checked_sum_int {
    ($($t:ty),*) => {
        $(
            impl CheckedSum for $t {
                fn checked_sum(&self, other: &Self) -> Option<Self> {
                    self.checked_add(*other)
                }
            }
        )*
    };
}

checked_sum_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! checked_sum_float {
    ($($t:ty),*) => {
        $(
            impl CheckedSum for $t {
                /// Finite operands must give a finite sum
                fn checked_sum(&self, other: &Self) -> Option<Self> {
                    let sum = self + other;
                    (sum.is_finite() || !self.is_finite() || !other.is_finite()).then_some(sum)
                }
            }
        )*
    };
}

checked_sum_float!(f32, f64);

/// `old + new`; overflow is a merge error
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<D, S> MergeStrategy<D, S> for Sum
where
    D: TagDomain,
    S: CheckedSum,
{
    fn merge(&self, tag: D, old: &S, new: S) -> eyre::Result<S> {
        old.checked_sum(&new)
            .ok_or_else(|| eyre::eyre!("{tag:?}: {old:?} + {new:?} overflows"))
    }
}

/// Keep the larger of the two
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl<D, S> MergeStrategy<D, S> for Max
where
    D: TagDomain,
    S: Clone + Ord,
{
    fn merge(&self, _tag: D, old: &S, new: S) -> eyre::Result<S> {
        Ok(if new > *old { new } else { old.clone() })
    }
}

/// Extend the held collection with the new delivery's items
#[derive(Debug, Clone, Copy, Default)]
pub struct Append;

impl<D, S> MergeStrategy<D, S> for Append
where
    D: TagDomain,
    S: Clone + IntoIterator + Extend<<S as IntoIterator>::Item>,
{
    fn merge(&self, _tag: D, old: &S, new: S) -> eyre::Result<S> {
        let mut merged = old.clone();
        merged.extend(new);
        Ok(merged)
    }
}
