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

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use fluxon_core::prelude::*;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, trace};

use super::definition::ModuleDefinition;
use super::view::StateView;

/// Lifecycle of a module runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    /// State is established; the pipeline is not subscribed yet.
    Constructed,
    /// The pipeline is subscribed and folds incoming events.
    Active,
    /// The store was torn down.
    Disposed,
}

/// One committed state, numbered in commit order.
#[derive(Debug, Clone)]
pub(crate) struct Commit {
    pub(crate) seq: u64,
    pub(crate) value: Arc<Value>,
}

/// Committed values waiting to be published, in commit order.
#[derive(Debug, Default)]
struct Outbox {
    publishing: bool,
    pending: VecDeque<Commit>,
}

/// Clears `Outbox::publishing` when a flush ends, even by unwinding.
struct PublishGuard<'a> {
    outbox: &'a Mutex<Outbox>,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        self.outbox.lock().publishing = false;
    }
}

/// The runtime half of a registered module.
///
/// Owns the committed state exclusively. Readers receive clones; the only writer is
/// [`ModuleRuntime::commit`].
pub(crate) struct ModuleRuntime {
    name: String,
    definition: ModuleDefinition,
    state: Mutex<Commit>,
    lifecycle: RwLock<Lifecycle>,
    /// Every commit, published in order once its outbox is flushed.
    commits: Subject<Commit>,
    outbox: Mutex<Outbox>,
    view: StateView,
    pipeline: Mutex<Option<Subscription>>,
}

impl fmt::Debug for ModuleRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRuntime")
            .field("name", &self.name)
            .field("lifecycle", &*self.lifecycle.read())
            .field("seq", &self.state.lock().seq)
            .field("subscribers", &self.view.subscriber_count())
            .finish()
    }
}

impl ModuleRuntime {
    pub(crate) fn new(name: String, definition: ModuleDefinition, initial: Value) -> Self {
        Self {
            name,
            definition,
            state: Mutex::new(Commit {
                seq: 0,
                value: Arc::new(initial),
            }),
            lifecycle: RwLock::new(Lifecycle::Constructed),
            commits: Subject::new(),
            outbox: Mutex::new(Outbox::default()),
            view: StateView::default(),
            pipeline: Mutex::new(None),
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn definition(&self) -> &ModuleDefinition {
        &self.definition
    }

    /// The current committed state.
    pub(crate) fn state(&self) -> Value {
        (*self.state.lock().value).clone()
    }

    /// The current committed state, shared with the commit record.
    pub(crate) fn shared_state(&self) -> Arc<Value> {
        self.state.lock().value.clone()
    }

    /// The current committed state with its commit number.
    pub(crate) fn committed(&self) -> Commit {
        self.state.lock().clone()
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read()
    }

    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// `Constructed -> Active`. Must happen before the pipeline connects, since a
    /// pipeline may emit while connecting.
    pub(crate) fn activate(&self) {
        let mut lifecycle = self.lifecycle.write();
        if *lifecycle == Lifecycle::Constructed {
            *lifecycle = Lifecycle::Active;
            debug!(module = %self.name, "module active");
        }
    }

    /// Keeps the accumulation pipeline alive for the rest of the store's lifetime.
    pub(crate) fn hold_pipeline(&self, pipeline: Subscription) {
        let replaced = self.pipeline.lock().replace(pipeline);
        drop(replaced);
    }

    /// Records `value` as the new committed state and queues it for publication.
    pub(crate) fn commit(&self, value: Value) -> Arc<Value> {
        let commit = {
            let mut state = self.state.lock();
            let commit = Commit {
                seq: state.seq + 1,
                value: Arc::new(value),
            };
            *state = commit.clone();
            commit
        };
        trace!(module = %self.name, seq = commit.seq, "state committed");
        let value = commit.value.clone();
        self.outbox.lock().pending.push_back(commit);
        value
    }

    /// Publishes queued commits in order.
    ///
    /// A flush started while another is running on the same thread returns at once;
    /// the running flush picks up whatever was queued meanwhile.
    pub(crate) fn flush(&self) -> Emission {
        {
            let mut outbox = self.outbox.lock();
            if outbox.publishing {
                return Ok(());
            }
            outbox.publishing = true;
        }
        let _publishing = PublishGuard {
            outbox: &self.outbox,
        };
        let mut first_fault = None;
        loop {
            let next = self.outbox.lock().pending.pop_front();
            let Some(next) = next else {
                break;
            };
            if let Err(fault) = self.commits.next(&next) {
                if first_fault.is_none() {
                    first_fault = Some(fault);
                } else {
                    error!(
                        module = %self.name,
                        error = %fault,
                        "additional fault while publishing state"
                    );
                }
            }
        }
        first_fault.map_or(Ok(()), Err)
    }

    /// Connects `observer` to this module's view.
    ///
    /// The observer first receives the current committed state, then every later commit.
    pub(crate) fn observe(this: &Arc<Self>, observer: ObserverFn<Value>) -> Subscription {
        this.view.acquire(&this.name, &this.commits);
        let current = this.committed();
        let attached = this.view.attach(current.seq, observer.clone());
        if let Err(fault) = observer(&*current.value) {
            error!(
                module = %this.name,
                error = %fault,
                "state view observer failed on replay"
            );
        }
        let runtime = Arc::downgrade(this);
        Subscription::new(move || {
            drop(attached);
            if let Some(runtime) = runtime.upgrade() {
                runtime.view.release(&runtime.name);
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.view.subscriber_count()
    }

    /// `* -> Disposed`: drops the pipeline, the view and every commit observer.
    pub(crate) fn dispose(&self) {
        *self.lifecycle.write() = Lifecycle::Disposed;
        let pipeline = self.pipeline.lock().take();
        drop(pipeline);
        self.view.dispose();
        self.commits.clear();
        self.outbox.lock().pending.clear();
        debug!(module = %self.name, "module disposed");
    }
}
