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

use futures::future::BoxFuture;

use crate::stream::{Emission, Subscription};

/// A unit of deferred work. Runs once, on a later scheduler turn.
pub type Task = Box<dyn FnOnce() -> Emission + Send>;

/// Decides when deferred work runs.
///
/// Streams that must not deliver in the producer's call frame (cross-module feedback,
/// completed asynchronous requests) hand their deliveries to a `Scheduler`. Each
/// scheduled task is one turn; tasks scheduled while a task runs execute after it.
pub trait Scheduler: Send + Sync + 'static {
    /// Queues `task` to run on a later turn.
    fn schedule(&self, task: Task);

    /// Starts asynchronous work. Dropping the returned subscription aborts it.
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Subscription;
}
