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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fluxon_core::prelude::*;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::runtime::Commit;

/// The multicast relay external observers of one module share.
///
/// The relay is linked to the module's commit channel while it has at least one
/// observer and unlinked when the last one leaves. The accumulation pipeline never
/// depends on it.
#[derive(Debug, Default)]
pub(crate) struct StateView {
    relay: Subject<Commit>,
    connection: Mutex<Option<Subscription>>,
    subscribers: AtomicUsize,
}

impl StateView {
    /// Registers one observer, linking the relay to `commits` if it is the first.
    pub(crate) fn acquire(&self, module: &str, commits: &Subject<Commit>) {
        if self.subscribers.fetch_add(1, Ordering::AcqRel) == 0 {
            debug!(module, "state view connected");
            let link = commits.as_stream().connect(self.relay.observer());
            let stale = self.connection.lock().replace(link);
            drop(stale);
        }
    }

    /// Unregisters one observer, unlinking the relay if it was the last.
    pub(crate) fn release(&self, module: &str) {
        if self.subscribers.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!(module, "state view disconnected");
            let link = self.connection.lock().take();
            drop(link);
        }
    }

    /// Attaches `observer` to commits numbered above `watermark`.
    ///
    /// The observer has already been given the commit numbered `watermark`; anything at
    /// or below it still queued for publication would be a regression.
    pub(crate) fn attach(&self, watermark: u64, observer: ObserverFn<Value>) -> Subscription {
        self.relay.as_stream().connect(Arc::new(move |commit: &Commit| {
            if commit.seq > watermark {
                observer(&*commit.value)
            } else {
                Ok(())
            }
        }))
    }

    /// Number of observers currently attached.
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Acquire)
    }

    /// Drops every observer and the link to the commit channel.
    pub(crate) fn dispose(&self) {
        self.relay.clear();
        let link = self.connection.lock().take();
        drop(link);
    }
}
