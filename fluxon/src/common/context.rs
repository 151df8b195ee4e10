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
use std::sync::{Arc, Weak};

use fluxon_core::prelude::*;
use serde_json::Value;

use crate::common::scheduler::StoreScheduler;
use crate::common::store_inner::StoreInner;
use crate::common::{StateSnapshot, StoreError};

/// A module's read capability over the store it belongs to.
///
/// Handles exist for every module before any module's wiring runs, so wiring may
/// capture the handle and refer to modules registered after its own. Every read goes
/// to the store at call or subscribe time; nothing is captured at construction.
///
/// Streams obtained here are *deferred*: they deliver on the store scheduler's next
/// turn rather than in the call frame of the commit that produced the value.
#[derive(Clone)]
pub struct ModuleContext {
    module: Arc<str>,
    store: Weak<StoreInner>,
    scheduler: Arc<StoreScheduler>,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

impl ModuleContext {
    /// The name of the module this handle was issued to.
    #[inline]
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// A snapshot of every module's current state.
    ///
    /// Empty once the store is gone.
    pub fn get_state(&self) -> StateSnapshot {
        self.store
            .upgrade()
            .map(|store| store.snapshot())
            .unwrap_or_default()
    }

    /// `name`'s state: the current value, then every commit, each on a later turn.
    ///
    /// # Errors
    /// [`StoreError::UnknownModule`] if no module named `name` is registered.
    pub fn get_state_stream(&self, name: &str) -> Result<Stream<Value>, StoreError> {
        let Some(store) = self.store.upgrade() else {
            return Ok(Stream::empty());
        };
        Ok(store.state_stream(name)?.observe_on(self.scheduler()))
    }

    /// Events of type `kind` that some module pipeline folded, each on a later turn.
    ///
    /// The stream carries the events as the folding pipelines received them, including
    /// ones their wiring derived, rather than the raw dispatched events.
    pub fn get_action_stream(&self, kind: impl Into<String>) -> Stream<Event> {
        match self.store.upgrade() {
            Some(store) => store.action_stream(kind).observe_on(self.scheduler()),
            None => Stream::empty(),
        }
    }

    /// The store's scheduler, for helpers that run asynchronous requests.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }
}

/// One [`ModuleContext`] per module, in registration order.
#[derive(Debug, Default)]
pub(crate) struct ContextRegistry {
    handles: Vec<ModuleContext>,
}

impl ContextRegistry {
    /// Issues a handle for each of `modules`.
    pub(crate) fn new<'a>(
        modules: impl IntoIterator<Item = &'a str>,
        store: &Weak<StoreInner>,
        scheduler: &Arc<StoreScheduler>,
    ) -> Self {
        let handles = modules
            .into_iter()
            .map(|module| ModuleContext {
                module: Arc::from(module),
                store: store.clone(),
                scheduler: scheduler.clone(),
            })
            .collect();
        Self { handles }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&ModuleContext> {
        self.handles.get(index)
    }
}
