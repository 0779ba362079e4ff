//! Sink - where published values go
//!
//! The engine only ever writes to a sink. [`LatestValue`] from the
//! `latestvalue` crate is the usual choice: it keeps the latest value and
//! replays it to late observers. [`RecordingSink`] keeps every value, which
//! is what tests and the replay CLI want.

use std::sync::{Mutex, PoisonError};

use latestvalue::LatestValue;
use tracing::debug;

/// Write-only destination for published values
pub trait Sink<T>: Send + Sync {
    fn publish(&self, value: T);
}

impl<T> Sink<T> for LatestValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn publish(&self, value: T) {
        LatestValue::publish(self, value);
    }
}

/// Sink that records every published value in order
#[derive(Debug)]
pub struct RecordingSink<T> {
    values: Mutex<Vec<T>>,
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordingSink<T> {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(Vec::new()),
        }
    }

    /// All values published so far
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Most recent value, if any
    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> Sink<T> for RecordingSink<T> {
    fn publish(&self, value: T) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.push(value);
        debug!(count = values.len(), "RecordingSink::publish: recorded");
    }
}
