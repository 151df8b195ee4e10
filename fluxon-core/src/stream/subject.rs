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

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{error, trace};

use super::{Emission, ObserverFn, Stream, Subscription};

/// A hot multicast channel.
///
/// Every value passed to [`Subject::next`] is delivered synchronously to the observers
/// connected at that moment, in the order they connected. A fault from one observer does
/// not stop delivery to the others; the first fault is returned to the caller and any
/// further ones are logged.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

struct SubjectInner<T> {
    /// Observers keyed by a monotonically increasing id, which preserves connect order.
    observers: RwLock<BTreeMap<u64, ObserverFn<T>>>,
    next_id: AtomicU64,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                observers: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.inner.observers.read().len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Subject<T> {
    /// Creates a subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `value` to every connected observer.
    pub fn next(&self, value: &T) -> Emission {
        // Snapshot so observers may connect or disconnect while we deliver.
        let observers: Vec<ObserverFn<T>> = self.inner.observers.read().values().cloned().collect();
        let mut first_fault = None;
        for observer in observers {
            if let Err(fault) = observer(value) {
                if first_fault.is_none() {
                    first_fault = Some(fault);
                } else {
                    error!(error = %fault, "additional observer fault during multicast");
                }
            }
        }
        first_fault.map_or(Ok(()), Err)
    }

    /// The subject viewed as a stream: connecting registers an observer.
    pub fn as_stream(&self) -> Stream<T> {
        let inner = Arc::downgrade(&self.inner);
        Stream::new(move |observer| match inner.upgrade() {
            Some(subject) => SubjectInner::attach(&subject, observer),
            None => Subscription::empty(),
        })
    }

    /// An observer that forwards everything it receives into this subject.
    ///
    /// The observer holds the subject weakly, so wiring a subject into an upstream
    /// source does not keep it alive.
    pub fn observer(&self) -> ObserverFn<T> {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |value: &T| match inner.upgrade() {
            Some(subject) => Subject { inner: subject }.next(value),
            None => Ok(()),
        })
    }

    /// Number of observers currently connected.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Disconnects every observer.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.inner.observers.write());
        trace!(count = drained.len(), "subject cleared");
        // Dropped outside the lock: observers may own subscriptions to this subject.
        drop(drained);
    }
}

impl<T: Send + Sync + 'static> SubjectInner<T> {
    fn attach(this: &Arc<Self>, observer: ObserverFn<T>) -> Subscription {
        let id = this.next_id.fetch_add(1, Ordering::Relaxed);
        this.observers.write().insert(id, observer);
        let weak: Weak<Self> = Arc::downgrade(this);
        Subscription::new(move || {
            if let Some(subject) = weak.upgrade() {
                let removed = subject.observers.write().remove(&id);
                drop(removed);
            }
        })
    }
}
