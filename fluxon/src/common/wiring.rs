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

//! Two-phase activation.
//!
//! Phase 1 establishes every module's state and issues every context handle. Phase 2
//! runs each module's wiring and subscribes its accumulation pipeline. Because every
//! handle exists before any wiring runs, a module can refer to any other module no
//! matter which was registered first, including one that refers back to it.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use fluxon_core::prelude::*;
use tracing::{debug, instrument, warn};

use crate::common::store_inner::StoreInner;
use crate::common::{FluxonConfig, StateSnapshot, StoreError};
use crate::module::{ModuleDefinition, ModuleRuntime};

/// Builds and activates a store.
pub(crate) struct WiringScheduler;

impl WiringScheduler {
    /// Runs both phases.
    ///
    /// On failure everything already activated is torn down again.
    #[instrument(skip_all, fields(modules = modules.len()))]
    pub(crate) fn activate(
        modules: Vec<(String, ModuleDefinition)>,
        preloaded: StateSnapshot,
        config: FluxonConfig,
    ) -> Result<Arc<StoreInner>, StoreError> {
        let runtimes = Self::construct(modules, preloaded)?;
        let store = StoreInner::new(runtimes, config);
        let activated = store
            .scheduler
            .start(Arc::downgrade(&store))
            .and_then(|()| Self::bind(&store));
        match activated {
            Ok(()) => Ok(store),
            Err(error) => {
                store.dispose();
                Err(error)
            }
        }
    }

    /// Phase 1: default or preloaded state for every module.
    fn construct(
        modules: Vec<(String, ModuleDefinition)>,
        mut preloaded: StateSnapshot,
    ) -> Result<Vec<Arc<ModuleRuntime>>, StoreError> {
        let mut names = HashSet::with_capacity(modules.len());
        let mut runtimes = Vec::with_capacity(modules.len());
        for (name, definition) in modules {
            if !names.insert(name.clone()) {
                return Err(StoreError::DuplicateModule(name));
            }
            let initial = match preloaded.remove(&name) {
                Some(state) => state,
                None => definition
                    .initial_state()
                    .map_err(|source| StoreError::Initialization {
                        module: name.clone(),
                        source,
                    })?,
            };
            runtimes.push(Arc::new(ModuleRuntime::new(name, definition, initial)));
        }
        for name in preloaded.keys() {
            warn!(module = %name, "preloaded state names no registered module; ignored");
        }
        debug!(modules = runtimes.len(), "phase 1 complete");
        Ok(runtimes)
    }

    /// Phase 2: wire and subscribe every module, in registration order, as one turn.
    fn bind(store: &Arc<StoreInner>) -> Result<(), StoreError> {
        store.turn(|| {
            for (position, runtime) in store.modules.iter().enumerate() {
                let context = store
                    .contexts
                    .get(position)
                    .ok_or_else(|| StoreError::UnknownModule(runtime.name().to_string()))?;
                let inputs = runtime
                    .definition()
                    .wire(&store.bus, context)
                    .map_err(|source| StoreError::Wiring {
                        module: runtime.name().to_string(),
                        source,
                    })?;
                runtime.activate();
                let pipeline = Stream::merge(inputs).connect(accumulator(store, runtime));
                runtime.hold_pipeline(pipeline);
            }
            debug!(modules = store.modules.len(), "phase 2 complete");
            Ok(())
        })
    }
}

/// The observer that folds a module's merged input into its state.
fn accumulator(store: &Arc<StoreInner>, runtime: &Arc<ModuleRuntime>) -> ObserverFn<Event> {
    let store: Weak<StoreInner> = Arc::downgrade(store);
    let runtime = runtime.clone();
    Arc::new(move |event: &Event| match store.upgrade() {
        Some(store) => store.fold(&runtime, event),
        None => Ok(()),
    })
}
