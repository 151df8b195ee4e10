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
use serde_json::Value;

use crate::common::store_inner::StoreInner;
use crate::common::wiring::WiringScheduler;
use crate::common::{FluxonConfig, Middleware, StateSnapshot, StoreError};
use crate::module::ModuleDefinition;

/// A store of independently defined modules.
///
/// Each `Store` is a self-contained instance; nothing is shared between stores.
/// Dropping it disposes every module, cancels deferred turns still queued and aborts
/// asynchronous requests still in flight.
///
/// # Examples
///
/// ```rust
/// use fluxon::prelude::*;
/// use serde_json::json;
///
/// # fn main() -> Result<(), StoreError> {
/// let counter = ModuleDefinition::new(
///     |actions: &ActionBus, _context: &ModuleContext| Ok(vec![actions.filter_action("INCREMENT")]),
///     |state: Option<&serde_json::Value>, _event: &Event| {
///         Ok(json!(state.and_then(|s| s.as_i64()).unwrap_or(-1) + 1))
///     },
/// );
/// let store = Store::builder()
///     .module("counter", counter)
///     .config(FluxonConfig::default())
///     .build()?;
///
/// store.dispatch(Event::new("INCREMENT"))?;
/// assert_eq!(store.get_state()["counter"], json!(1));
/// # Ok(())
/// # }
/// ```
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("inner", &self.inner).finish()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl Store {
    /// Starts describing a store.
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Pushes `event` to every module.
    ///
    /// Returns after every pipeline that derives from the bus without crossing another
    /// module's output has committed and notified the middleware. Pipelines fed by
    /// context streams see the resulting commits on a later turn.
    ///
    /// # Errors
    /// * [`StoreError::InvalidEvent`] if the event type is empty.
    /// * [`StoreError::Transition`] for the first transition that faulted; that module
    ///   keeps its previous state and every other module still folded the event.
    /// * [`StoreError::DispatchDepthExceeded`] if called from middleware or a subscriber
    ///   nested too deeply.
    pub fn dispatch(&self, event: Event) -> Result<(), StoreError> {
        self.inner.dispatch(event)
    }

    /// An immutable snapshot mapping every module name to its current state.
    #[must_use]
    pub fn get_state(&self) -> StateSnapshot {
        self.inner.snapshot()
    }

    /// `name`'s state as a stream.
    ///
    /// A new observer immediately receives the current state, then every later commit
    /// in commit order. Observers share one relay, which is connected while at least one
    /// observer is attached; the module keeps folding events either way.
    ///
    /// # Errors
    /// [`StoreError::UnknownModule`] if no module named `name` is registered.
    pub fn get_state_stream(&self, name: &str) -> Result<Stream<Value>, StoreError> {
        self.inner.state_stream(name)
    }

    /// Replaces the middleware; `None` disables it.
    pub fn set_middleware(&self, middleware: Option<Middleware>) {
        self.inner.set_middleware(middleware);
    }

    /// Overwrites the state of each module named in `partial`, bypassing transitions,
    /// and publishes it. Modules not named are untouched.
    ///
    /// # Errors
    /// [`StoreError::UnknownModule`] if any name is unregistered; no state changes then.
    pub fn hydrate(&self, partial: StateSnapshot) -> Result<(), StoreError> {
        self.inner.hydrate(partial)
    }

    /// Resets every module to its default state, as if freshly built without preloaded state.
    ///
    /// # Errors
    /// [`StoreError::Initialization`] if a transition faults on the INIT event; no state
    /// changes then.
    pub fn clear_state(&self) -> Result<(), StoreError> {
        self.inner.clear_state()
    }
}

/// Collects modules, preloaded state and configuration for a [`Store`].
#[derive(Debug, Default)]
pub struct StoreBuilder {
    modules: Vec<(String, ModuleDefinition)>,
    preloaded: StateSnapshot,
    config: Option<FluxonConfig>,
}

impl StoreBuilder {
    /// Registers a module under `name`.
    #[must_use]
    pub fn module(
        mut self,
        name: impl Into<String>,
        definition: impl Into<ModuleDefinition>,
    ) -> Self {
        self.modules.push((name.into(), definition.into()));
        self
    }

    /// Initial states that take precedence over the modules' defaults.
    #[must_use]
    pub fn preloaded(mut self, state: StateSnapshot) -> Self {
        self.preloaded = state;
        self
    }

    /// Uses `config` instead of the one loaded from XDG locations.
    #[must_use]
    pub fn config(mut self, config: FluxonConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Constructs and activates the store.
    ///
    /// # Errors
    /// * [`StoreError::DuplicateModule`] if two modules share a name.
    /// * [`StoreError::Initialization`] if a transition faults on the INIT event.
    /// * [`StoreError::Wiring`] if a module's wiring fails.
    /// * [`StoreError::Scheduler`] if the deferred-turn driver cannot start.
    pub fn build(self) -> Result<Store, StoreError> {
        let config = self.config.unwrap_or_else(FluxonConfig::load);
        let inner = WiringScheduler::activate(self.modules, self.preloaded, config)?;
        Ok(Store { inner })
    }
}

/// Builds a store from `modules` and optional preloaded state, configured from XDG locations.
///
/// # Errors
/// See [`StoreBuilder::build`].
pub fn create_store<I, N>(modules: I, preloaded: Option<StateSnapshot>) -> Result<Store, StoreError>
where
    I: IntoIterator<Item = (N, ModuleDefinition)>,
    N: Into<String>,
{
    create_store_with_config(modules, preloaded, FluxonConfig::load())
}

/// Builds a store from `modules` and optional preloaded state with an explicit configuration.
///
/// # Errors
/// See [`StoreBuilder::build`].
pub fn create_store_with_config<I, N>(
    modules: I,
    preloaded: Option<StateSnapshot>,
    config: FluxonConfig,
) -> Result<Store, StoreError>
where
    I: IntoIterator<Item = (N, ModuleDefinition)>,
    N: Into<String>,
{
    modules
        .into_iter()
        .fold(Store::builder(), |builder, (name, definition)| {
            builder.module(name, definition)
        })
        .preloaded(preloaded.unwrap_or_default())
        .config(config)
        .build()
}
