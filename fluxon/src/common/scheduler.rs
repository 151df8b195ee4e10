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
use std::sync::{OnceLock, Weak};

use fluxon_core::prelude::*;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::common::config::SchedulerConfig;
use crate::common::store_inner::StoreInner;
use crate::common::StoreError;

/// The store's deferred-turn queue.
///
/// Tasks run one at a time, in the order they were scheduled, on a single driver task.
/// One task is one turn. The driver runs on the tokio runtime the store was built in,
/// or on a dedicated thread when the store was built outside any runtime.
pub(crate) struct StoreScheduler {
    sender: mpsc::UnboundedSender<Task>,
    /// Taken by [`StoreScheduler::start`].
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Task>>>,
    /// The runtime the driver and spawned requests run on.
    handle: OnceLock<Handle>,
    cancellation_token: CancellationToken,
    config: SchedulerConfig,
}

impl fmt::Debug for StoreScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreScheduler")
            .field("started", &self.handle.get().is_some())
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .field("config", &self.config)
            .finish()
    }
}

impl StoreScheduler {
    pub(crate) fn new(config: SchedulerConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            handle: OnceLock::new(),
            cancellation_token: CancellationToken::new(),
            config,
        }
    }

    /// Starts the driver. Tasks scheduled earlier run once it is up.
    pub(crate) fn start(&self, store: Weak<StoreInner>) -> Result<(), StoreError> {
        let Some(receiver) = self.receiver.lock().take() else {
            return Err(StoreError::Scheduler(
                "scheduler already started".to_string(),
            ));
        };
        let driver = drive(
            receiver,
            store,
            self.cancellation_token.clone(),
            self.config.batch_limit.max(1),
        );

        let handle = match Handle::try_current() {
            Ok(handle) => {
                debug!("scheduler driver spawned on the current runtime");
                handle.spawn(driver);
                handle
            }
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| StoreError::Scheduler(e.to_string()))?;
                let handle = runtime.handle().clone();
                std::thread::Builder::new()
                    .name(self.config.thread_name.clone())
                    .spawn(move || runtime.block_on(driver))
                    .map_err(|e| StoreError::Scheduler(e.to_string()))?;
                debug!(
                    thread = %self.config.thread_name,
                    "scheduler driver started on a dedicated thread"
                );
                handle
            }
        };
        let _ = self.handle.set(handle);
        Ok(())
    }

    /// Stops the driver; queued and future tasks never run.
    pub(crate) fn shutdown(&self) {
        self.cancellation_token.cancel();
    }
}

impl Scheduler for StoreScheduler {
    fn schedule(&self, task: Task) {
        if self.cancellation_token.is_cancelled() || self.sender.send(task).is_err() {
            trace!("scheduler stopped, task dropped");
        }
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) -> Subscription {
        if self.cancellation_token.is_cancelled() {
            return Subscription::empty();
        }
        match self.handle.get() {
            Some(handle) => {
                let task = handle.spawn(future);
                Subscription::new(move || task.abort())
            }
            None => {
                warn!("asynchronous work spawned before the scheduler started; ignored");
                Subscription::empty()
            }
        }
    }
}

/// Drains the queue until the store is gone or the token is cancelled.
async fn drive(
    mut receiver: mpsc::UnboundedReceiver<Task>,
    store: Weak<StoreInner>,
    cancellation_token: CancellationToken,
    batch_limit: usize,
) {
    let mut ran = 0usize;
    loop {
        tokio::select! {
            biased;
            () = cancellation_token.cancelled() => {
                debug!("scheduler driver cancelled");
                break;
            }
            next = receiver.recv() => {
                let Some(task) = next else { break };
                {
                    let Some(store) = store.upgrade() else { break };
                    store.run_deferred(task);
                }
                ran += 1;
                if ran >= batch_limit {
                    ran = 0;
                    tokio::task::yield_now().await;
                }
            }
        }
    }
    trace!("scheduler driver stopped");
}
