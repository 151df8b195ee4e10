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

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Boxed teardown closure run exactly once when a subscription ends.
type Teardown = Box<dyn FnOnce() + Send>;

/// A handle to an active connection between a [`Stream`](super::Stream) and an observer.
///
/// Dropping the `Subscription` (or calling [`Subscription::unsubscribe`]) runs the
/// teardown registered by the source, which detaches the observer and releases any
/// upstream resources. The teardown runs at most once.
///
/// Sources that finish on their own (for example a single asynchronous request that
/// already delivered its result) may mark the subscription as finished through a
/// shared flag so that owners holding many subscriptions can prune them.
#[must_use = "dropping a Subscription immediately unsubscribes the observer"]
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
    finished: Option<Arc<AtomicBool>>,
}

impl Subscription {
    /// Creates a subscription that runs `teardown` when it ends.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
            finished: None,
        }
    }

    /// Creates a subscription whose source can report completion through `finished`.
    pub fn finishing<F>(finished: Arc<AtomicBool>, teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
            finished: Some(finished),
        }
    }

    /// A subscription with nothing to tear down.
    #[inline]
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(None),
            finished: None,
        }
    }

    /// Groups several subscriptions so that they end together.
    pub fn from_many(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    /// Ends the subscription now.
    #[inline]
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Returns `true` once the teardown ran or the source reported that it finished.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.teardown.lock().is_none()
            || self
                .finished
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.get_mut().take() {
            teardown();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
