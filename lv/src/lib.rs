//! LatestValue - latest-value broadcast channel
//!
//! A `LatestValue<T>` holds the most recently published value and fans it out
//! to every registered observer. Observers registered after a publish receive
//! the current value immediately on registration, so a late subscriber never
//! misses the state it joined into.
//!
//! Two ways to listen:
//!
//! - **Callbacks**: [`LatestValue::observe`] registers a closure and returns a
//!   [`Subscription`] guard. Dropping the guard unsubscribes.
//! - **Async**: [`LatestValue::watch`] returns a `tokio::sync::watch::Receiver`
//!   that starts out holding the current value.
//!
//! # Usage
//!
//! ```rust
//! use latestvalue::LatestValue;
//! use std::sync::{Arc, Mutex};
//!
//! let channel = LatestValue::new();
//! channel.publish(8);
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let _sub = channel.observe(move |v: &i32| sink.lock().unwrap().push(*v));
//!
//! channel.publish(10);
//! assert_eq!(*seen.lock().unwrap(), vec![8, 10]);
//! ```

mod subscription;
mod value;

pub use subscription::Subscription;
pub use value::LatestValue;
