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
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::scheduler::{Scheduler, Task};
use crate::stream::Subscription;

/// A scheduler whose queue only advances when a test says so.
#[derive(Default)]
pub(crate) struct QueueScheduler {
    queue: Mutex<VecDeque<Task>>,
}

impl QueueScheduler {
    /// Runs queued tasks, including ones queued meanwhile, until the queue is empty.
    pub(crate) fn run_pending(&self) {
        loop {
            let next = self.queue.lock().pop_front();
            let Some(task) = next else { break };
            let _ = task();
        }
    }

    /// Alternates between running the queue and letting spawned work progress.
    pub(crate) async fn settle(&self, total: Duration) {
        let step = Duration::from_millis(5);
        let mut waited = Duration::ZERO;
        while waited < total {
            self.run_pending();
            tokio::time::sleep(step).await;
            waited += step;
        }
        self.run_pending();
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) -> Subscription {
        let handle = tokio::spawn(future);
        Subscription::new(move || handle.abort())
    }
}
