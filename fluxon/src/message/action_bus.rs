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
use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;
use fluxon_core::prelude::*;
use tracing::{error, trace};

/// Multicast channel of events; the ingress every module's wiring derives from.
///
/// Besides the whole-bus stream (reachable through [`Deref`]), the bus keeps one
/// [`Subject`] per event type so that [`ActionBus::filter_action`] routes an event to
/// its type's observers without testing every other type's filter. Whole-bus observers
/// see an event before type-scoped observers do.
#[derive(Clone)]
pub struct ActionBus {
    /// Observers of every event.
    all: Subject<Event>,
    /// `all`, viewed as a stream.
    stream: Stream<Event>,
    /// Type-scoped subjects keyed by event type, shared by every consumer of that type.
    by_type: Arc<DashMap<String, Subject<Event>>>,
}

/// Allows the bus to be used wherever a `Stream<Event>` is expected.
impl Deref for ActionBus {
    type Target = Stream<Event>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        let all = Subject::new();
        let stream = all.as_stream();
        Self {
            all,
            stream,
            by_type: Arc::new(DashMap::new()),
        }
    }
}

impl fmt::Debug for ActionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBus")
            .field("observers", &self.all.observer_count())
            .field("types", &self.by_type.len())
            .finish()
    }
}

impl ActionBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` synchronously to every current observer, then returns.
    ///
    /// # Returns
    /// The first fault any observer returned; delivery to the remaining observers
    /// continues regardless.
    pub fn push(&self, event: &Event) -> Emission {
        trace!(event_type = event.kind(), "bus push");
        let whole = self.all.next(event);
        // Clone the subject out so the shard lock is not held while observers run.
        let scoped = self
            .by_type
            .get(event.kind())
            .map(|entry| entry.value().clone());
        let scoped = match scoped {
            Some(subject) => subject.next(event),
            None => Ok(()),
        };
        match (whole, scoped) {
            (Err(first), Err(second)) => {
                error!(error = %second, "additional observer fault during bus push");
                Err(first)
            }
            (Err(fault), Ok(())) | (Ok(()), Err(fault)) => Err(fault),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// The whole bus as a stream.
    #[must_use]
    pub fn as_stream(&self) -> Stream<Event> {
        self.stream.clone()
    }

    /// The events of type `kind`.
    ///
    /// Every call for the same type returns a view of the same shared channel.
    pub fn filter_action(&self, kind: impl Into<String>) -> Stream<Event> {
        self.by_type.entry(kind.into()).or_default().as_stream()
    }

    /// Disconnects every observer.
    pub(crate) fn clear(&self) {
        self.all.clear();
        let scoped: Vec<Subject<Event>> = self
            .by_type
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for subject in scoped {
            subject.clear();
        }
    }
}
