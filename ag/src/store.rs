//! HoldStore - sparse per-tag holding area

use std::collections::HashMap;

use crate::tag::TagDomain;

/// Sparse mapping from tag to the value currently held for it
///
/// An absent tag means nothing has been delivered for it yet. Only the
/// aggregator mutates a store; rules see it through a shared borrow.
#[derive(Debug, Clone)]
pub struct HoldStore<D, S> {
    held: HashMap<D, S>,
}

impl<D, S> Default for HoldStore<D, S> {
    fn default() -> Self {
        Self { held: HashMap::new() }
    }
}

impl<D: TagDomain, S> HoldStore<D, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value held for `tag`, if any
    pub fn get(&self, tag: D) -> Option<&S> {
        self.held.get(&tag)
    }

    pub fn contains(&self, tag: D) -> bool {
        self.held.contains_key(&tag)
    }

    /// True when every tag in `tags` has a held value
    pub fn contains_all(&self, tags: &[D]) -> bool {
        tags.iter().all(|tag| self.held.contains_key(tag))
    }

    /// Tags of the domain that have not been delivered yet, in `D::ALL` order
    pub fn missing(&self) -> Vec<D> {
        D::ALL.iter().copied().filter(|tag| !self.held.contains_key(tag)).collect()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Held tags, in no particular order
    pub fn tags(&self) -> impl Iterator<Item = D> + '_ {
        self.held.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (D, &S)> + '_ {
        self.held.iter().map(|(tag, value)| (*tag, value))
    }

    pub(crate) fn insert(&mut self, tag: D, value: S) {
        self.held.insert(tag, value);
    }
}
