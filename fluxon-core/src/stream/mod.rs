/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Push-based streams.
//!
//! A [`Stream`] is a cold description of a source of values. Connecting an observer
//! to it returns a [`Subscription`]; values are pushed into the observer synchronously,
//! in the call frame of whoever produced them. Faults returned by an observer travel
//! back to the producer, which is how a failing transition surfaces at the `dispatch`
//! call that triggered it.
//!
//! [`Subject`] is the hot, multicast building block every shared view is made of.

use std::fmt;
use std::sync::Arc;

use tracing::error;

pub use subject::Subject;
pub use subscription::Subscription;

mod operators;
mod subject;
mod subscription;

/// Result of pushing one value into an observer.
pub type Emission = anyhow::Result<()>;

/// A shareable observer callback.
pub type ObserverFn<T> = Arc<dyn Fn(&T) -> Emission + Send + Sync>;

/// The function a stream runs each time an observer connects.
type SubscribeFn<T> = dyn Fn(ObserverFn<T>) -> Subscription + Send + Sync;

/// A cold, cloneable source of values of type `T`.
///
/// Every call to [`Stream::connect`] (or [`Stream::subscribe`]) runs the source's
/// subscribe function for that observer alone. Use [`Stream::share`] to multicast
/// a single upstream connection to many observers.
pub struct Stream<T> {
    subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: self.subscribe_fn.clone(),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Stream<T> {
    /// Creates a stream from its subscribe function.
    ///
    /// The function receives the connecting observer and returns the subscription
    /// that detaches it.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(ObserverFn<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe_fn: Arc::new(subscribe),
        }
    }

    /// A stream that never emits.
    pub fn empty() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// A stream that pushes `values` to each observer as soon as it connects.
    ///
    /// There is no caller to hand a fault to at connect time, so faults are logged.
    pub fn of(values: Vec<T>) -> Self {
        let values = Arc::new(values);
        Self::new(move |observer| {
            for value in values.iter() {
                if let Err(fault) = observer(value) {
                    error!(error = %fault, "observer fault while replaying a static stream");
                }
            }
            Subscription::empty()
        })
    }

    /// Merges several streams into one that emits whatever any of them emits.
    pub fn merge<I>(streams: I) -> Self
    where
        I: IntoIterator<Item = Stream<T>>,
    {
        let streams: Arc<Vec<Stream<T>>> = Arc::new(streams.into_iter().collect());
        Self::new(move |observer| {
            let subscriptions = streams
                .iter()
                .map(|stream| stream.connect(observer.clone()))
                .collect();
            Subscription::from_many(subscriptions)
        })
    }

    /// Connects a fallible observer.
    #[inline]
    pub fn connect(&self, observer: ObserverFn<T>) -> Subscription {
        (self.subscribe_fn)(observer)
    }

    /// Connects an infallible callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.connect(Arc::new(move |value: &T| {
            callback(value);
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn static_stream_replays_to_every_observer() {
        let stream = Stream::of(vec![1, 2, 3]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let sink = seen.clone();
            let _subscription = stream.subscribe(move |value| sink.lock().push(*value));
        }
        assert_eq!(*seen.lock(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn merge_forwards_all_sources() {
        let left = Subject::new();
        let right = Subject::new();
        let merged = Stream::merge(vec![left.as_stream(), right.as_stream()]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = merged.subscribe(move |value: &u32| sink.lock().push(*value));

        left.next(&1).unwrap();
        right.next(&2).unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);

        drop(subscription);
        left.next(&3).unwrap();
        assert_eq!(left.observer_count(), 0);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
