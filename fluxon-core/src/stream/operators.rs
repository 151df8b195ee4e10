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

//! Stream operators.
//!
//! All operators are synchronous except [`Stream::observe_on`], which is the one place
//! a value crosses into a later scheduler turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ObserverFn, Stream, Subject, Subscription};
use crate::scheduler::Scheduler;

/// Bookkeeping for [`Stream::share`].
struct ShareState<T> {
    subject: Subject<T>,
    connection: Option<Subscription>,
    observers: usize,
}

impl<T: Send + Sync + 'static> Stream<T> {
    /// Passes through only the values for which `predicate` holds.
    pub fn filter<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Stream::new(move |observer| {
            let predicate = predicate.clone();
            source.connect(Arc::new(move |value: &T| {
                if predicate(value) {
                    observer(value)
                } else {
                    Ok(())
                }
            }))
        })
    }

    /// Transforms every value.
    pub fn map<U, F>(&self, transform: F) -> Stream<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let transform = Arc::new(transform);
        Stream::new(move |observer: ObserverFn<U>| {
            let transform = transform.clone();
            source.connect(Arc::new(move |value: &T| observer(&transform(value))))
        })
    }

    /// Transforms values, dropping those mapped to `None`.
    pub fn filter_map<U, F>(&self, transform: F) -> Stream<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let transform = Arc::new(transform);
        Stream::new(move |observer: ObserverFn<U>| {
            let transform = transform.clone();
            source.connect(Arc::new(move |value: &T| match transform(value) {
                Some(mapped) => observer(&mapped),
                None => Ok(()),
            }))
        })
    }

    /// Runs `effect` for each value before passing it on unchanged.
    pub fn tap<F>(&self, effect: F) -> Stream<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let source = self.clone();
        let effect = Arc::new(effect);
        Stream::new(move |observer| {
            let effect = effect.clone();
            source.connect(Arc::new(move |value: &T| {
                effect(value);
                observer(value)
            }))
        })
    }

    /// Merges this stream with `other`.
    pub fn merge_with(&self, other: &Stream<T>) -> Stream<T> {
        Stream::merge([self.clone(), other.clone()])
    }

    /// Multicasts one upstream connection to every observer.
    ///
    /// The upstream is connected when the first observer arrives and torn down when
    /// the last one leaves; a later observer connects it again.
    pub fn share(&self) -> Stream<T> {
        let source = self.clone();
        let state = Arc::new(Mutex::new(ShareState {
            subject: Subject::new(),
            connection: None,
            observers: 0,
        }));
        Stream::new(move |observer| {
            let (subject, first) = {
                let mut shared = state.lock();
                shared.observers += 1;
                (shared.subject.clone(), shared.observers == 1)
            };
            let attached = subject.as_stream().connect(observer);
            if first {
                // Connected outside the lock: the source may emit synchronously.
                let connection = source.connect(subject.observer());
                let stale = {
                    let mut shared = state.lock();
                    if shared.observers == 0 {
                        Some(connection)
                    } else {
                        shared.connection = Some(connection);
                        None
                    }
                };
                drop(stale);
            }

            let state = state.clone();
            Subscription::new(move || {
                drop(attached);
                let connection = {
                    let mut shared = state.lock();
                    shared.observers = shared.observers.saturating_sub(1);
                    if shared.observers == 0 {
                        shared.connection.take()
                    } else {
                        None
                    }
                };
                drop(connection);
            })
        })
    }

    /// Forwards values until `notifier` emits for the first time.
    pub fn take_until<U>(&self, notifier: &Stream<U>) -> Stream<T>
    where
        U: Send + Sync + 'static,
    {
        let source = self.clone();
        let notifier = notifier.clone();
        Stream::new(move |observer| {
            let stopped = Arc::new(AtomicBool::new(false));
            let upstream: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

            let signal = {
                let stopped = stopped.clone();
                let upstream = upstream.clone();
                notifier.connect(Arc::new(move |_: &U| {
                    if !stopped.swap(true, Ordering::AcqRel) {
                        let connection = upstream.lock().take();
                        drop(connection);
                    }
                    Ok(())
                }))
            };
            if stopped.load(Ordering::Acquire) {
                return signal;
            }

            let gate = stopped.clone();
            let connection = source.connect(Arc::new(move |value: &T| {
                if gate.load(Ordering::Acquire) {
                    Ok(())
                } else {
                    observer(value)
                }
            }));
            if stopped.load(Ordering::Acquire) {
                drop(connection);
            } else {
                *upstream.lock() = Some(connection);
            }

            Subscription::new(move || {
                drop(signal);
                let connection = upstream.lock().take();
                drop(connection);
            })
        })
    }

    /// Maps every value to an inner stream and merges all inner streams.
    ///
    /// Inner subscriptions live until the outer subscription ends; inner sources that
    /// report completion are pruned as new values arrive.
    pub fn flat_map<U, F>(&self, project: F) -> Stream<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> Stream<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let project = Arc::new(project);
        Stream::new(move |observer: ObserverFn<U>| {
            let inners: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
            let project = project.clone();
            let active = inners.clone();
            let outer = source.connect(Arc::new(move |value: &T| {
                let inner = project(value).connect(observer.clone());
                let finished = {
                    let mut active = active.lock();
                    let (open, finished): (Vec<_>, Vec<_>) = active
                        .drain(..)
                        .partition(|subscription| !subscription.is_closed());
                    *active = open;
                    active.push(inner);
                    finished
                };
                drop(finished);
                Ok(())
            }));
            Subscription::new(move || {
                drop(outer);
                let drained = std::mem::take(&mut *inners.lock());
                drop(drained);
            })
        })
    }

    /// Maps every value to an inner stream, keeping only the most recent one connected.
    pub fn switch_map<U, F>(&self, project: F) -> Stream<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> Stream<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let project = Arc::new(project);
        Stream::new(move |observer: ObserverFn<U>| {
            let current: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
            let project = project.clone();
            let slot = current.clone();
            let outer = source.connect(Arc::new(move |value: &T| {
                let previous = slot.lock().take();
                drop(previous);
                let inner = project(value).connect(observer.clone());
                let replaced = slot.lock().replace(inner);
                drop(replaced);
                Ok(())
            }));
            Subscription::new(move || {
                drop(outer);
                let last = current.lock().take();
                drop(last);
            })
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Delivers every value as its own task on `scheduler`.
    ///
    /// Nothing is delivered once the subscription has ended, even if the task was
    /// already queued.
    pub fn observe_on(&self, scheduler: Arc<dyn Scheduler>) -> Stream<T> {
        let source = self.clone();
        Stream::new(move |observer| {
            let active = Arc::new(AtomicBool::new(true));
            let gate = active.clone();
            let scheduler = scheduler.clone();
            let upstream = source.connect(Arc::new(move |value: &T| {
                let observer = observer.clone();
                let gate = gate.clone();
                let value = value.clone();
                scheduler.schedule(Box::new(move || {
                    if gate.load(Ordering::Acquire) {
                        observer(&value)
                    } else {
                        Ok(())
                    }
                }));
                Ok(())
            }));
            Subscription::new(move || {
                active.store(false, Ordering::Release);
                drop(upstream);
            })
        })
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Stream<T> {
    /// Drops values equal to the one delivered just before them.
    pub fn distinct_until_changed(&self) -> Stream<T> {
        let source = self.clone();
        Stream::new(move |observer| {
            let last: Mutex<Option<T>> = Mutex::new(None);
            source.connect(Arc::new(move |value: &T| {
                {
                    let mut last = last.lock();
                    if last.as_ref() == Some(value) {
                        return Ok(());
                    }
                    *last = Some(value.clone());
                }
                observer(value)
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::QueueScheduler;

    fn collect<T: Clone + Send + Sync + 'static>(
        stream: &Stream<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = stream.subscribe(move |value: &T| sink.lock().push(value.clone()));
        (seen, subscription)
    }

    #[test]
    fn filter_and_map_compose() {
        let subject = Subject::new();
        let stream = subject
            .as_stream()
            .filter(|n: &i32| n % 2 == 0)
            .map(|n| n * 10);
        let (seen, _subscription) = collect(&stream);
        for n in 1..=4 {
            subject.next(&n).unwrap();
        }
        assert_eq!(*seen.lock(), vec![20, 40]);
    }

    #[test]
    fn share_connects_upstream_once_and_disconnects_on_last_observer() {
        let subject = Subject::new();
        let shared = subject.as_stream().map(|n: &i32| n + 1).share();

        let (first, first_subscription) = collect(&shared);
        let (second, second_subscription) = collect(&shared);
        assert_eq!(subject.observer_count(), 1);

        subject.next(&1).unwrap();
        assert_eq!(*first.lock(), vec![2]);
        assert_eq!(*second.lock(), vec![2]);

        drop(first_subscription);
        assert_eq!(subject.observer_count(), 1);
        drop(second_subscription);
        assert_eq!(subject.observer_count(), 0);

        let (third, _third_subscription) = collect(&shared);
        subject.next(&5).unwrap();
        assert_eq!(*third.lock(), vec![6]);
    }

    #[test]
    fn take_until_stops_on_first_signal() {
        let values = Subject::new();
        let stop = Subject::<()>::new();
        let (seen, _subscription) = collect(&values.as_stream().take_until(&stop.as_stream()));

        values.next(&1).unwrap();
        stop.next(&()).unwrap();
        values.next(&2).unwrap();
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(values.observer_count(), 0);
    }

    #[test]
    fn switch_map_drops_the_previous_inner() {
        let outer = Subject::new();
        let inner_a = Subject::new();
        let inner_b = Subject::new();
        let (a, b) = (inner_a.clone(), inner_b.clone());
        let switched = outer.as_stream().switch_map(move |pick: &char| match pick {
            'a' => a.as_stream(),
            _ => b.as_stream(),
        });
        let (seen, _subscription) = collect(&switched);

        outer.next(&'a').unwrap();
        inner_a.next(&1).unwrap();
        outer.next(&'b').unwrap();
        inner_a.next(&2).unwrap();
        inner_b.next(&3).unwrap();
        assert_eq!(*seen.lock(), vec![1, 3]);
        assert_eq!(inner_a.observer_count(), 0);
    }

    #[test]
    fn flat_map_keeps_every_inner_connected() {
        let outer = Subject::new();
        let inner = Subject::new();
        let source = inner.clone();
        let flattened = outer
            .as_stream()
            .flat_map(move |offset: &i32| {
                let offset = *offset;
                source.as_stream().map(move |n: &i32| n + offset)
            });
        let (seen, _subscription) = collect(&flattened);

        outer.next(&100).unwrap();
        outer.next(&200).unwrap();
        inner.next(&1).unwrap();
        assert_eq!(*seen.lock(), vec![101, 201]);
    }

    #[test]
    fn distinct_until_changed_skips_repeats() {
        let subject = Subject::new();
        let (seen, _subscription) = collect(&subject.as_stream().distinct_until_changed());
        for n in [1, 1, 2, 2, 1] {
            subject.next(&n).unwrap();
        }
        assert_eq!(*seen.lock(), vec![1, 2, 1]);
    }

    #[test]
    fn observe_on_defers_to_the_next_turn() {
        let scheduler = Arc::new(QueueScheduler::default());
        let subject = Subject::new();
        let (seen, subscription) =
            collect(&subject.as_stream().observe_on(scheduler.clone()));

        subject.next(&1).unwrap();
        assert!(seen.lock().is_empty());
        scheduler.run_pending();
        assert_eq!(*seen.lock(), vec![1]);

        subject.next(&2).unwrap();
        drop(subscription);
        scheduler.run_pending();
        assert_eq!(*seen.lock(), vec![1]);
    }
}
