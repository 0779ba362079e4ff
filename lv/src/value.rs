//! The latest-value channel itself

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::subscription::Subscription;

pub(crate) type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Latest-value broadcast channel
///
/// Cheap to clone; clones share the same current value and observer set.
pub struct LatestValue<T> {
    pub(crate) inner: Arc<Inner<T>>,
}

pub(crate) struct Inner<T> {
    /// Held for a whole publish or replay so observers see values in order
    notify: Mutex<()>,
    state: Mutex<State<T>>,
    tx: watch::Sender<Option<T>>,
}

pub(crate) struct State<T> {
    version: u64,
    next_id: u64,
    pub(crate) observers: BTreeMap<u64, Observer<T>>,
}

impl<T> Inner<T> {
    /// The state lock is never held while user code runs, and observers
    /// cannot leave the guarded data half-updated, so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_notify(&self) -> MutexGuard<'_, ()> {
        self.notify.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for LatestValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for LatestValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty channel (no current value)
    pub fn new() -> Self {
        debug!("LatestValue::new: called");
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                notify: Mutex::new(()),
                state: Mutex::new(State {
                    version: 0,
                    next_id: 0,
                    observers: BTreeMap::new(),
                }),
                tx,
            }),
        }
    }

    /// Store `value` as current and notify every registered observer
    ///
    /// Observers run synchronously, in registration order, after the value is
    /// stored. Concurrent publishes are notified one at a time, in the order
    /// they were stored. An observer may read the channel (`get`, `version`,
    /// `observer_count`, `watch`) and drop subscriptions, but must not
    /// `publish` to or `observe` the same channel. An observer unsubscribed
    /// while a publish is in flight may still receive that one value.
    pub fn publish(&self, value: T) {
        let _notify = self.inner.lock_notify();
        let observers: Vec<Observer<T>> = {
            let mut state = self.inner.lock();
            state.version += 1;
            debug!(
                version = state.version,
                observers = state.observers.len(),
                "LatestValue::publish: called"
            );
            self.inner.tx.send_replace(Some(value.clone()));
            state.observers.values().cloned().collect()
        };

        for observer in observers {
            observer(&value);
        }
    }

    /// Register an observer, replaying the current value to it if one exists
    pub fn observe<F>(&self, observer: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _notify = self.inner.lock_notify();
        let observer: Observer<T> = Arc::new(observer);
        let id = {
            let mut state = self.inner.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.observers.insert(id, Arc::clone(&observer));
            id
        };
        debug!(id, "LatestValue::observe: registered observer");
        let subscription = Subscription::new(Arc::downgrade(&self.inner), id);

        let current = self.inner.tx.borrow().clone();
        if let Some(current) = current {
            debug!(id, "LatestValue::observe: replaying current value");
            observer(&current);
        }

        subscription
    }

    /// Async subscription; the receiver starts out holding the current value
    pub fn watch(&self) -> watch::Receiver<Option<T>> {
        debug!("LatestValue::watch: called");
        self.inner.tx.subscribe()
    }

    /// Snapshot of the current value
    pub fn get(&self) -> Option<T> {
        self.inner.tx.borrow().clone()
    }

    /// Number of publishes since creation
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Number of registered callback observers
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn collector<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &T| sink.lock().unwrap().push(v.clone()))
    }

    #[test]
    fn test_new_channel_is_empty() {
        let channel = LatestValue::<i32>::new();
        assert_eq!(channel.get(), None);
        assert_eq!(channel.version(), 0);
        assert_eq!(channel.observer_count(), 0);
    }

    #[test]
    fn test_observe_before_publish_gets_no_replay() {
        let channel = LatestValue::new();
        let (seen, observer) = collector::<i32>();
        let _sub = channel.observe(observer);
        assert!(seen.lock().unwrap().is_empty());

        channel.publish(3);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_late_observer_receives_current_value() {
        let channel = LatestValue::new();
        channel.publish(1);
        channel.publish(2);

        let (seen, observer) = collector::<i32>();
        let _sub = channel.observe(observer);
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_all_observers_notified() {
        let channel = LatestValue::new();
        let (a, obs_a) = collector::<&'static str>();
        let (b, obs_b) = collector::<&'static str>();
        let _sa = channel.observe(obs_a);
        let _sb = channel.observe(obs_b);

        channel.publish("x");
        assert_eq!(*a.lock().unwrap(), vec!["x"]);
        assert_eq!(*b.lock().unwrap(), vec!["x"]);
    }

    #[test]
    fn test_clones_share_state() {
        let channel = LatestValue::new();
        let other = channel.clone();
        other.publish(42);
        assert_eq!(channel.get(), Some(42));
        assert_eq!(channel.version(), 1);
    }

    #[tokio::test]
    async fn test_watch_replays_and_follows() {
        let channel = LatestValue::new();
        channel.publish(5);

        let mut rx = channel.watch();
        assert_eq!(*rx.borrow_and_update(), Some(5));

        let publisher = channel.clone();
        tokio::spawn(async move {
            publisher.publish(6);
        });

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("timed out")
            .expect("sender dropped");
        assert_eq!(*rx.borrow(), Some(6));
    }

    /// Run `f` on another thread, failing the test if it does not finish
    fn finishes_within(secs: u64, f: impl FnOnce() + Send + 'static) -> bool {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            f();
            let _ = done_tx.send(());
        });
        done_rx.recv_timeout(Duration::from_secs(secs)).is_ok()
    }

    #[test]
    fn test_observer_can_read_the_channel() {
        let channel = LatestValue::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = channel.clone();
        let sink = Arc::clone(&seen);
        let _sub = channel.observe(move |v: &i32| {
            sink.lock()
                .unwrap()
                .push((*v, reader.version(), reader.observer_count(), reader.get()));
        });

        let publisher = channel.clone();
        assert!(finishes_within(3, move || publisher.publish(1)));
        assert_eq!(*seen.lock().unwrap(), vec![(1, 1, 1, Some(1))]);
    }

    #[test]
    fn test_observer_can_drop_a_subscription() {
        let channel = LatestValue::<i32>::new();
        let (seen, observer) = collector::<i32>();
        let victim = Arc::new(Mutex::new(Some(channel.observe(observer))));

        let dropper = Arc::clone(&victim);
        let _sub = channel.observe(move |_: &i32| {
            drop(dropper.lock().unwrap().take());
        });

        let publisher = channel.clone();
        assert!(finishes_within(3, move || publisher.publish(1)));
        assert_eq!(channel.observer_count(), 1);

        channel.publish(2);
        assert!(!seen.lock().unwrap().contains(&2));
    }

    #[test]
    fn test_concurrent_publishes_notify_in_store_order() {
        let channel = LatestValue::<u64>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reader = channel.clone();
        let sink = Arc::clone(&seen);
        let _sub = channel.observe(move |v: &u64| {
            sink.lock().unwrap().push((*v, reader.version()));
        });

        let publishers: Vec<_> = (0..4)
            .map(|p| {
                let channel = channel.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        channel.publish(p * 1_000 + i);
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 400);
        // Each notification saw the version its own publish produced
        let versions: Vec<u64> = seen.iter().map(|(_, version)| *version).collect();
        assert_eq!(versions, (1..=400).collect::<Vec<_>>());
        assert_eq!(channel.get(), Some(seen[399].0));
    }

    proptest! {
        #[test]
        fn prop_observer_sees_every_publish_in_order(values in prop::collection::vec(any::<i64>(), 0..50)) {
            let channel = LatestValue::new();
            let (seen, observer) = collector::<i64>();
            let _sub = channel.observe(observer);

            for v in &values {
                channel.publish(*v);
            }

            prop_assert_eq!(&*seen.lock().unwrap(), &values);
            prop_assert_eq!(channel.version(), values.len() as u64);
            prop_assert_eq!(channel.get(), values.last().copied());
        }
    }
}
