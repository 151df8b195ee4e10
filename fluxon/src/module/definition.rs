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
use std::sync::Arc;

use fluxon_core::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::common::ModuleContext;
use crate::message::ActionBus;

/// A module's pure fold from `(state, event)` to the next state.
///
/// The state is `None` only while computing the module's default state from the INIT event.
pub type TransitionFn = Arc<dyn Fn(Option<&Value>, &Event) -> anyhow::Result<Value> + Send + Sync>;

/// A module's declaration of the event streams that drive its transition.
pub type WiringFn =
    Arc<dyn Fn(&ActionBus, &ModuleContext) -> anyhow::Result<Vec<Stream<Event>>> + Send + Sync>;

/// Behavior of a module expressed as a type rather than a pair of closures.
///
/// Any `ModuleLogic` converts into a [`ModuleDefinition`] with `.into()`.
pub trait ModuleLogic: Send + Sync + 'static {
    /// Returns the streams whose events this module folds.
    ///
    /// Called exactly once, when the store activates the module. `context` may be kept
    /// and used later to read any module's state.
    fn wiring(
        &self,
        actions: &ActionBus,
        context: &ModuleContext,
    ) -> anyhow::Result<Vec<Stream<Event>>>;

    /// Folds `event` into `state`.
    fn transition(&self, state: Option<&Value>, event: &Event) -> anyhow::Result<Value>;
}

/// The caller-supplied, immutable description of a module.
///
/// # Examples
///
/// ```rust
/// use fluxon::prelude::*;
/// use serde_json::json;
///
/// let counter = ModuleDefinition::new(
///     |actions: &ActionBus, _context: &ModuleContext| Ok(vec![actions.filter_action("INCREMENT")]),
///     |state: Option<&serde_json::Value>, _event: &Event| {
///         Ok(json!(state.and_then(|s| s.as_i64()).unwrap_or(0) + 1))
///     },
/// );
/// # let _ = counter;
/// ```
#[derive(Clone)]
pub struct ModuleDefinition {
    wiring: WiringFn,
    transition: TransitionFn,
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition").finish_non_exhaustive()
    }
}

impl ModuleDefinition {
    /// Creates a definition from a wiring closure and a transition closure.
    pub fn new<W, T>(wiring: W, transition: T) -> Self
    where
        W: Fn(&ActionBus, &ModuleContext) -> anyhow::Result<Vec<Stream<Event>>>
            + Send
            + Sync
            + 'static,
        T: Fn(Option<&Value>, &Event) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            wiring: Arc::new(wiring),
            transition: Arc::new(transition),
        }
    }

    /// Creates a definition that folds every event on the bus.
    pub fn passthrough<T>(transition: T) -> Self
    where
        T: Fn(Option<&Value>, &Event) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(
            |actions: &ActionBus, _context: &ModuleContext| Ok(vec![actions.as_stream()]),
            transition,
        )
    }

    /// Creates a definition whose state is the serde type `S`.
    ///
    /// The default state is `reducer(S::default(), INIT)`. The committed state is stored
    /// as JSON and converted back to `S` for every fold, so `S` must round-trip through
    /// `serde_json`.
    pub fn typed<S, W, R>(wiring: W, reducer: R) -> Self
    where
        S: Serialize + DeserializeOwned + Default + 'static,
        W: Fn(&ActionBus, &ModuleContext) -> anyhow::Result<Vec<Stream<Event>>>
            + Send
            + Sync
            + 'static,
        R: Fn(S, &Event) -> anyhow::Result<S> + Send + Sync + 'static,
    {
        Self::new(wiring, move |state: Option<&Value>, event: &Event| {
            let current = match state {
                Some(value) => serde_json::from_value::<S>(value.clone())?,
                None => S::default(),
            };
            Ok(serde_json::to_value(reducer(current, event)?)?)
        })
    }

    /// Runs this module's wiring.
    #[inline]
    pub(crate) fn wire(
        &self,
        actions: &ActionBus,
        context: &ModuleContext,
    ) -> anyhow::Result<Vec<Stream<Event>>> {
        (self.wiring)(actions, context)
    }

    /// Runs this module's transition.
    #[inline]
    pub(crate) fn transition(&self, state: Option<&Value>, event: &Event) -> anyhow::Result<Value> {
        (self.transition)(state, event)
    }

    /// The module's default state.
    pub(crate) fn initial_state(&self) -> anyhow::Result<Value> {
        self.transition(None, &Event::init())
    }
}

impl<M: ModuleLogic> From<M> for ModuleDefinition {
    fn from(logic: M) -> Self {
        let logic = Arc::new(logic);
        let wiring = logic.clone();
        Self::new(
            move |actions: &ActionBus, context: &ModuleContext| wiring.wiring(actions, context),
            move |state: Option<&Value>, event: &Event| logic.transition(state, event),
        )
    }
}
