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

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use fluxon_core::prelude::*;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::common::context::ContextRegistry;
use crate::common::scheduler::StoreScheduler;
use crate::common::{FluxonConfig, Middleware, StateSnapshot, StoreError};
use crate::message::ActionBus;
use crate::module::ModuleRuntime;

/// Internal state of a store.
///
/// Owns the bus, every module runtime, the context handles and the middleware slot.
/// All mutation happens inside a *turn*: a section holding the store-wide reentrant
/// turn lock, so the store has a single logical thread of control even when deferred
/// turns run on another thread.
pub(crate) struct StoreInner {
    /// Handle to this allocation, for streams that must re-enter the store later.
    this: Weak<StoreInner>,
    /// Module runtimes in registration order.
    pub(crate) modules: Vec<Arc<ModuleRuntime>>,
    index: HashMap<String, usize>,
    pub(crate) contexts: ContextRegistry,
    /// Ingress for dispatched events.
    pub(crate) bus: ActionBus,
    /// Events some module pipeline folded, for context action streams.
    folded: ActionBus,
    /// Events already fed to `folded`, one frame per running turn.
    fed_frames: Mutex<Vec<Vec<Event>>>,
    middleware: RwLock<Option<Middleware>>,
    /// Nesting depth of the turn currently running.
    turn_lock: ReentrantMutex<Cell<usize>>,
    /// Events delivered to any pipeline's accumulator, ever.
    deliveries: AtomicU64,
    /// Event types already reported as unhandled.
    reported_unhandled: DashMap<String, ()>,
    disposed: AtomicBool,
    pub(crate) scheduler: Arc<StoreScheduler>,
    pub(crate) config: FluxonConfig,
}

impl fmt::Debug for StoreInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreInner")
            .field("modules", &self.modules)
            .field("bus", &self.bus)
            .field("scheduler", &self.scheduler)
            .field("disposed", &self.disposed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Restores the turn depth and drops the turn's fed frame, even when unwinding.
struct TurnGuard<'a> {
    store: &'a StoreInner,
    guard: ReentrantMutexGuard<'a, Cell<usize>>,
    depth: usize,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.guard.set(self.depth);
        let frame = self.store.fed_frames.lock().pop();
        drop(frame);
    }
}

impl StoreInner {
    /// Allocates the store around already-constructed module runtimes.
    ///
    /// Context handles are issued here, before any wiring runs.
    pub(crate) fn new(modules: Vec<Arc<ModuleRuntime>>, config: FluxonConfig) -> Arc<Self> {
        let scheduler = Arc::new(StoreScheduler::new(config.scheduler.clone()));
        let index = modules
            .iter()
            .enumerate()
            .map(|(position, runtime)| (runtime.name().to_string(), position))
            .collect();
        Arc::new_cyclic(|this: &Weak<StoreInner>| {
            let contexts = ContextRegistry::new(
                modules.iter().map(|runtime| runtime.name()),
                this,
                &scheduler,
            );
            StoreInner {
                this: this.clone(),
                modules,
                index,
                contexts,
                bus: ActionBus::new(),
                folded: ActionBus::new(),
                fed_frames: Mutex::new(Vec::new()),
                middleware: RwLock::new(None),
                turn_lock: ReentrantMutex::new(Cell::new(0)),
                deliveries: AtomicU64::new(0),
                reported_unhandled: DashMap::new(),
                disposed: AtomicBool::new(false),
                scheduler,
                config,
            }
        })
    }

    /// Runs `work` as a turn, or as a nested turn if one is already running on this thread.
    ///
    /// # Errors
    /// [`StoreError::DispatchDepthExceeded`] when nesting would exceed
    /// `limits.max_dispatch_depth` (at least one); otherwise whatever `work` returns.
    pub(crate) fn turn<R>(
        &self,
        work: impl FnOnce() -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let guard = self.turn_lock.lock();
        let depth = guard.get();
        let limit = self.config.limits.max_dispatch_depth.max(1);
        if depth >= limit {
            warn!(depth, limit, "turn nesting limit reached");
            return Err(StoreError::DispatchDepthExceeded(limit));
        }
        guard.set(depth + 1);
        self.fed_frames.lock().push(Vec::new());
        let _turn = TurnGuard {
            store: self,
            guard,
            depth,
        };
        work()
    }

    /// Holds the turn lock without counting a nested turn.
    pub(crate) fn hold_turn(&self) -> ReentrantMutexGuard<'_, Cell<usize>> {
        self.turn_lock.lock()
    }

    pub(crate) fn runtime(&self, name: &str) -> Result<&Arc<ModuleRuntime>, StoreError> {
        self.index
            .get(name)
            .map(|&position| &self.modules[position])
            .ok_or_else(|| StoreError::UnknownModule(name.to_string()))
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Every module's current state, taken between turns.
    pub(crate) fn snapshot(&self) -> StateSnapshot {
        let _turn = self.hold_turn();
        self.modules
            .iter()
            .map(|runtime| (runtime.name().to_string(), runtime.state()))
            .collect()
    }

    /// Pushes an external event through the bus.
    pub(crate) fn dispatch(&self, event: Event) -> Result<(), StoreError> {
        if event.kind().is_empty() {
            return Err(StoreError::InvalidEvent(
                "event type must not be empty".to_string(),
            ));
        }
        if self.is_disposed() {
            debug!(event_type = event.kind(), "dispatch after disposal ignored");
            return Ok(());
        }
        self.turn(|| {
            trace!(event_type = event.kind(), "dispatch");
            let before = self.deliveries.load(Ordering::Acquire);
            let outcome = self.bus.push(&event);
            if self.deliveries.load(Ordering::Acquire) == before {
                self.report_unhandled(&event);
            }
            outcome.map_err(StoreError::from)
        })
    }

    fn report_unhandled(&self, event: &Event) {
        if !self.config.behavior.report_unhandled_events {
            return;
        }
        if self
            .reported_unhandled
            .insert(event.kind().to_string(), ())
            .is_none()
        {
            warn!(
                event_type = event.kind(),
                "no module pipeline folded this event type"
            );
        }
    }

    /// Folds `event` into `runtime`'s state: compute, commit, middleware, feed, publish.
    ///
    /// A faulting transition leaves the module's state untouched.
    pub(crate) fn fold(&self, runtime: &ModuleRuntime, event: &Event) -> Emission {
        if !runtime.is_active() {
            return Ok(());
        }
        self.deliveries.fetch_add(1, Ordering::AcqRel);
        let previous = runtime.shared_state();
        let next = match runtime.definition().transition(Some(&*previous), event) {
            Ok(next) => next,
            Err(source) => {
                debug!(
                    module = runtime.name(),
                    event_type = event.kind(),
                    error = %source,
                    "transition failed"
                );
                return Err(anyhow::Error::new(StoreError::Transition {
                    module: runtime.name().to_string(),
                    event_type: event.kind().to_string(),
                    source,
                }));
            }
        };
        let next = runtime.commit(next);
        self.notify_middleware(runtime.name(), event, &previous, &next);
        let fed = self.feed(event);
        let published = runtime.flush();
        fed.and(published)
    }

    fn notify_middleware(&self, module: &str, event: &Event, previous: &Value, next: &Value) {
        if self.config.behavior.skip_middleware_when_unchanged && previous == next {
            return;
        }
        // Clone out of the slot: the middleware may replace itself.
        let middleware = self.middleware.read().clone();
        if let Some(middleware) = middleware {
            middleware.call(module, event, previous, next);
        }
    }

    /// Offers `event` to context action streams, at most once per turn.
    ///
    /// A nested dispatch of the same event runs in its own turn and is offered again.
    fn feed(&self, event: &Event) -> Emission {
        {
            let mut frames = self.fed_frames.lock();
            if let Some(fed) = frames.last_mut() {
                if fed.iter().any(|seen| Event::ptr_eq(seen, event)) {
                    return Ok(());
                }
                fed.push(event.clone());
            }
        }
        self.folded.push(event)
    }

    pub(crate) fn set_middleware(&self, middleware: Option<Middleware>) {
        *self.middleware.write() = middleware;
    }

    /// Overwrites the state of each module named in `partial` without running transitions.
    pub(crate) fn hydrate(&self, partial: StateSnapshot) -> Result<(), StoreError> {
        if let Some(unknown) = partial.keys().find(|name| !self.index.contains_key(*name)) {
            return Err(StoreError::UnknownModule(unknown.clone()));
        }
        self.turn(|| {
            let mut outcome = Ok(());
            for (name, state) in partial {
                let runtime = self.runtime(&name)?;
                debug!(module = %name, "hydrating state");
                runtime.commit(state);
                let published = runtime.flush();
                outcome = outcome.and(published);
            }
            outcome.map_err(StoreError::from)
        })
    }

    /// Resets every module to its default state.
    pub(crate) fn clear_state(&self) -> Result<(), StoreError> {
        self.turn(|| {
            let defaults = self
                .modules
                .iter()
                .map(default_state)
                .collect::<Result<Vec<_>, _>>()?;
            debug!(modules = self.modules.len(), "clearing state");
            let mut outcome = Ok(());
            for (runtime, state) in self.modules.iter().zip(defaults) {
                runtime.commit(state);
                outcome = outcome.and(runtime.flush());
            }
            outcome.map_err(StoreError::from)
        })
    }

    /// `name`'s view: the current state on subscribe, then every commit, synchronously.
    pub(crate) fn state_stream(&self, name: &str) -> Result<Stream<Value>, StoreError> {
        let runtime = self.runtime(name)?.clone();
        let store = self.this.clone();
        Ok(Stream::new(move |observer| {
            let Some(inner) = store.upgrade().filter(|inner| !inner.is_disposed()) else {
                return Subscription::empty();
            };
            let attached = {
                let _turn = inner.hold_turn();
                ModuleRuntime::observe(&runtime, observer)
            };
            let store = store.clone();
            Subscription::new(move || {
                let inner = store.upgrade();
                let _turn = inner.as_ref().map(|inner| inner.hold_turn());
                drop(attached);
            })
        }))
    }

    /// Events of type `kind` that some module pipeline folded, synchronously.
    pub(crate) fn action_stream(&self, kind: impl Into<String>) -> Stream<Event> {
        self.folded.filter_action(kind)
    }

    /// Runs a task popped from the scheduler queue as its own turn.
    pub(crate) fn run_deferred(&self, task: Task) {
        if self.is_disposed() {
            return;
        }
        if let Err(fault) = self.turn(|| task().map_err(StoreError::from)) {
            error!(error = %fault, "deferred turn failed");
        }
    }

    /// Tears everything down; pending deferred work never runs.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _turn = self.hold_turn();
        self.scheduler.shutdown();
        for runtime in &self.modules {
            runtime.dispose();
        }
        self.bus.clear();
        self.folded.clear();
        self.set_middleware(None);
        debug!("store disposed");
    }
}

/// `runtime`'s default state, computed from INIT.
fn default_state(runtime: &Arc<ModuleRuntime>) -> Result<Value, StoreError> {
    match runtime.definition().initial_state() {
        Ok(state) => Ok(state),
        Err(source) => Err(StoreError::Initialization {
            module: runtime.name().to_string(),
            source,
        }),
    }
}
