//! Tag domain - the closed set of producer discriminators

use std::fmt::Debug;
use std::hash::Hash;

/// A closed, finite set of tags identifying where a delivery came from
///
/// Implement this for a fieldless enum and list every variant in `ALL`.
/// Tags outside the domain cannot be constructed, so the engine never sees
/// an unknown tag.
///
/// ```rust
/// use aggregator::TagDomain;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Source {
///     Local,
///     Remote,
/// }
///
/// impl TagDomain for Source {
///     const ALL: &'static [Self] = &[Source::Local, Source::Remote];
/// }
///
/// assert_eq!(Source::ALL.len(), 2);
/// ```
pub trait TagDomain: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every member of the domain
    const ALL: &'static [Self];
}
