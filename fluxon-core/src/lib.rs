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

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

//! # Fluxon Core
//!
//! The stream substrate the `fluxon` store is built on.
//!
//! - **Streams (`Stream`)**: cold, push-based sources with the operators module wiring
//!   needs (`filter`, `map`, `merge`, `share`, `switch_map`, `observe_on`, ...).
//! - **Subjects (`Subject`)**: hot multicast channels.
//! - **Subscriptions (`Subscription`)**: RAII handles; dropping one disconnects.
//! - **Schedulers (`Scheduler`)**: decide when deferred deliveries run.
//! - **Events (`Event`)**: the immutable tagged record modules fold into state.
//! - **Helpers (`ext`)**: event selection, payload extraction and request operators.

/// The event record.
pub mod event;

/// Extension traits used by module wiring.
pub mod ext;

/// Deferred-work scheduling.
pub mod scheduler;

/// Streams, subjects and subscriptions.
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::event::{Event, EventSource, INIT_EVENT_TYPE};
    pub use crate::ext::{from_request, ActionStreamExt, MapActionExt, RequestStreamExt};
    pub use crate::scheduler::{Scheduler, Task};
    pub use crate::stream::{Emission, ObserverFn, Stream, Subject, Subscription};
}
