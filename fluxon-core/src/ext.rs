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

//! Helper capabilities module wiring is written with.
//!
//! These are extension traits over [`Stream`], kept apart from the store so the wiring
//! layer can take them as a dependency:
//!
//! * [`ActionStreamExt`]: select events by type, extract and rewrite payloads.
//! * [`MapActionExt`]: turn arbitrary values into events of a given type.
//! * [`RequestStreamExt`]: run an asynchronous request per value and emit its
//!   outcome as an ordinary value, never as a fault.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;

use crate::event::{Event, EventSource};
use crate::scheduler::Scheduler;
use crate::stream::{ObserverFn, Stream, Subscription};

/// Event-specific operators.
pub trait ActionStreamExt {
    /// Keeps events of type `kind`; the result is shared.
    fn filter_action(&self, kind: impl Into<String>) -> Stream<Event>;

    /// The payload of each event, then the value under each of `keys` in turn.
    ///
    /// Missing payloads or keys yield `Value::Null`.
    fn pluck_payload(&self, keys: &[&str]) -> Stream<Value>;

    /// Rewrites each event's payload, keeping its type and error flag.
    fn map_payload<F>(&self, rewrite: F) -> Stream<Event>
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static;
}

impl ActionStreamExt for Stream<Event> {
    fn filter_action(&self, kind: impl Into<String>) -> Stream<Event> {
        let kind = kind.into();
        self.filter(move |event: &Event| event.kind() == kind)
            .share()
    }

    fn pluck_payload(&self, keys: &[&str]) -> Stream<Value> {
        let keys: Vec<String> = keys.iter().map(|key| (*key).to_string()).collect();
        self.map(move |event: &Event| {
            keys.iter()
                .fold(event.payload(), |current, key| {
                    current.and_then(|value| value.get(key))
                })
                .cloned()
                .unwrap_or(Value::Null)
        })
    }

    fn map_payload<F>(&self, rewrite: F) -> Stream<Event>
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.map(move |event: &Event| {
            let payload = event.payload().cloned().unwrap_or(Value::Null);
            Event::new(event.kind())
                .with_payload(rewrite(&payload))
                .with_error(event.is_error())
        })
    }
}

/// Turns values into events.
pub trait MapActionExt {
    /// Converts each value into an event of type `kind`; the result is shared.
    ///
    /// Values that already look like events are retagged, anything else becomes the
    /// payload of a new event.
    fn map_action(&self, kind: impl Into<String>) -> Stream<Event>;
}

impl<T> MapActionExt for Stream<T>
where
    T: Clone + Into<EventSource> + Send + Sync + 'static,
{
    fn map_action(&self, kind: impl Into<String>) -> Stream<Event> {
        let kind = kind.into();
        self.map(move |value: &T| {
            let source: EventSource = value.clone().into();
            source.into_event(kind.clone())
        })
        .share()
    }
}

/// Asynchronous request operators.
///
/// Each request runs on the scheduler's runtime. A success emits the returned value; a
/// failure emits `{"error": true, "payload": "<message>"}`. Either way the emission
/// happens on a later scheduler turn, and a failed request never ends the stream.
pub trait RequestStreamExt<T> {
    /// Starts a request for every value; outcomes are merged as they complete.
    ///
    /// When `cancel` emits, every request still in flight is abandoned.
    fn flat_request<F, Fut>(
        &self,
        scheduler: Arc<dyn Scheduler>,
        request: F,
        cancel: Option<Stream<Event>>,
    ) -> Stream<Value>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static;

    /// Starts a request for every value, abandoning the previous one if it is still in flight.
    fn switch_request<F, Fut>(
        &self,
        scheduler: Arc<dyn Scheduler>,
        request: F,
        cancel: Option<Stream<Event>>,
    ) -> Stream<Value>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static;
}

impl<T: Clone + Send + Sync + 'static> RequestStreamExt<T> for Stream<T> {
    fn flat_request<F, Fut>(
        &self,
        scheduler: Arc<dyn Scheduler>,
        request: F,
        cancel: Option<Stream<Event>>,
    ) -> Stream<Value>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.flat_map(request_projection(scheduler, request, cancel))
    }

    fn switch_request<F, Fut>(
        &self,
        scheduler: Arc<dyn Scheduler>,
        request: F,
        cancel: Option<Stream<Event>>,
    ) -> Stream<Value>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.switch_map(request_projection(scheduler, request, cancel))
    }
}

/// A stream that runs one request per observer and emits its outcome once.
pub fn from_request<F, Fut>(scheduler: Arc<dyn Scheduler>, request: F) -> Stream<Value>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Stream::new(move |observer| {
        spawn_request(&scheduler, request(), observer, None)
    })
}

fn request_projection<T, F, Fut>(
    scheduler: Arc<dyn Scheduler>,
    request: F,
    cancel: Option<Stream<Event>>,
) -> impl Fn(&T) -> Stream<Value> + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    let request = Arc::new(request);
    move |value: &T| {
        let input = value.clone();
        let request = request.clone();
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        Stream::new(move |observer| {
            let pending = request(input.clone());
            spawn_request(&scheduler, pending, observer, cancel.as_ref())
        })
    }
}

fn spawn_request<Fut>(
    scheduler: &Arc<dyn Scheduler>,
    pending: Fut,
    observer: ObserverFn<Value>,
    cancel: Option<&Stream<Event>>,
) -> Subscription
where
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    // Set once the outcome was delivered or the request was abandoned.
    let finished = Arc::new(AtomicBool::new(false));
    let task_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let signal_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let deliver = scheduler.clone();
    let done = finished.clone();
    let signal = signal_slot.clone();
    let task = scheduler.spawn(Box::pin(async move {
        let outcome = match pending.await {
            Ok(value) => value,
            Err(fault) => {
                debug!(error = %fault, "request failed, emitting an error value");
                json!({ "error": true, "payload": fault.to_string() })
            }
        };
        deliver.schedule(Box::new(move || {
            if done.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let listener = signal.lock().take();
            drop(listener);
            observer(&outcome)
        }));
    }));
    *task_slot.lock() = Some(task);

    if let Some(cancel) = cancel {
        let done = finished.clone();
        let abandoned = task_slot.clone();
        let listener = cancel.connect(Arc::new(move |_: &Event| {
            if !done.swap(true, Ordering::AcqRel) {
                let task = abandoned.lock().take();
                drop(task);
            }
            Ok(())
        }));
        *signal_slot.lock() = Some(listener);
    }

    let closed = finished.clone();
    Subscription::finishing(finished, move || {
        closed.store(true, Ordering::Release);
        let task = task_slot.lock().take();
        drop(task);
        let listener = signal_slot.lock().take();
        drop(listener);
    })
}
