//! Subscription guard returned by `LatestValue::observe`

use std::sync::Weak;

use tracing::debug;

use crate::value::Inner;

/// Keeps an observer registered; dropping it unsubscribes
///
/// The guard holds only a weak reference, so it never keeps the channel alive.
#[must_use = "dropping a Subscription unsubscribes the observer immediately"]
pub struct Subscription<T> {
    inner: Weak<Inner<T>>,
    id: u64,
}

impl<T> Subscription<T> {
    pub(crate) fn new(inner: Weak<Inner<T>>, id: u64) -> Self {
        Self { inner, id }
    }

    /// Observer id, unique per channel
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the observer now
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        debug!(id = self.id, "Subscription::drop: unsubscribing");
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().observers.remove(&self.id);
        }
    }
}
