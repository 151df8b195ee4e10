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

//! The tagged event record every module folds into its state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Type of the event each module's transition receives once, with no prior state,
/// to produce its default state.
pub const INIT_EVENT_TYPE: &str = "@@fluxon/INIT";

/// Wire shape of an event: `{ "type": ..., "payload"?: ..., "error"?: true }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EventBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    error: bool,
}

/// An immutable tagged record.
///
/// Cloning is cheap: clones share one body, and [`Event::ptr_eq`] tells whether two
/// events are the same object rather than merely equal.
#[derive(Clone, PartialEq)]
pub struct Event {
    body: Arc<EventBody>,
}

impl Event {
    /// Creates an event of type `kind` with no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            body: Arc::new(EventBody {
                kind: kind.into(),
                payload: None,
                error: false,
            }),
        }
    }

    /// Creates an error event: `{ type: kind, payload, error: true }`.
    pub fn failure(kind: impl Into<String>, payload: Value) -> Self {
        Self::new(kind).with_payload(payload).with_error(true)
    }

    /// The event every transition sees when computing its default state.
    #[must_use]
    pub fn init() -> Self {
        Self::new(INIT_EVENT_TYPE)
    }

    /// Attaches `payload`.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        Arc::make_mut(&mut self.body).payload = Some(payload);
        self
    }

    /// Sets the error flag.
    #[must_use]
    pub fn with_error(mut self, error: bool) -> Self {
        Arc::make_mut(&mut self.body).error = error;
        self
    }

    /// A copy of this event carrying type `kind`; payload and error flag are kept.
    #[must_use]
    pub fn retag(&self, kind: impl Into<String>) -> Self {
        let mut body = (*self.body).clone();
        body.kind = kind.into();
        Self {
            body: Arc::new(body),
        }
    }

    /// The event type.
    #[inline]
    pub fn kind(&self) -> &str {
        &self.body.kind
    }

    /// The payload, if any.
    #[inline]
    pub fn payload(&self) -> Option<&Value> {
        self.body.payload.as_ref()
    }

    /// Whether this event reports a failure.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.body.error
    }

    /// Whether this is the initialization event.
    #[inline]
    pub fn is_init(&self) -> bool {
        self.body.kind == INIT_EVENT_TYPE
    }

    /// Whether `a` and `b` are the same event object.
    #[inline]
    pub fn ptr_eq(a: &Event, b: &Event) -> bool {
        Arc::ptr_eq(&a.body, &b.body)
    }

    /// The event in its wire shape.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&*self.body).unwrap_or(Value::Null)
    }

    /// Reads an event from its wire shape.
    ///
    /// Returns `None` unless `value` is an object that looks like an event: it has a
    /// non-empty string `type` or `error: true`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !looks_tagged(value) {
            return None;
        }
        serde_json::from_value::<EventBody>(value.clone())
            .ok()
            .map(|body| Self {
                body: Arc::new(body),
            })
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Event");
        debug.field("type", &self.body.kind);
        if let Some(payload) = &self.body.payload {
            debug.field("payload", payload);
        }
        if self.body.error {
            debug.field("error", &true);
        }
        debug.finish()
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        EventBody::deserialize(deserializer).map(|body| Self {
            body: Arc::new(body),
        })
    }
}

fn looks_tagged(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    let has_type = object
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| !kind.is_empty());
    let is_error = object
        .get("error")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    has_type || is_error
}

/// A value on its way to becoming an [`Event`].
///
/// Whether something is already tagged is decided once, when the source is built;
/// [`EventSource::into_event`] then applies the target type without looking again.
#[derive(Debug, Clone)]
pub enum EventSource {
    /// Already an event; retagging keeps its payload and error flag.
    Tagged(Event),
    /// A plain value that becomes the payload of a new event.
    Raw(Value),
}

impl EventSource {
    /// Produces an event of type `kind`.
    pub fn into_event(self, kind: impl Into<String>) -> Event {
        match self {
            EventSource::Tagged(event) => event.retag(kind),
            EventSource::Raw(payload) => Event::new(kind).with_payload(payload),
        }
    }
}

impl From<Event> for EventSource {
    fn from(event: Event) -> Self {
        EventSource::Tagged(event)
    }
}

impl From<Value> for EventSource {
    fn from(value: Value) -> Self {
        match Event::from_value(&value) {
            Some(event) => EventSource::Tagged(event),
            None => EventSource::Raw(value),
        }
    }
}
