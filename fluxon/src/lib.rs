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

//! # Fluxon
//!
//! A reactive state-container runtime. Callers register independent *modules*, each
//! owning a slice of state, a pure transition function and a declaration of the event
//! streams that feed it. The store wires the declarations together and exposes a
//! synchronous snapshot and dispatch API plus state streams.
//!
//! ## Key Concepts
//!
//! - **Modules (`ModuleDefinition`)**: a wiring function and a transition function,
//!   built from closures, from a `ModuleLogic` implementation or from a serde type.
//! - **Bus (`ActionBus`)**: the multicast channel every dispatched event enters through.
//! - **Context (`ModuleContext`)**: a module's read capability over every other module,
//!   valid before any wiring runs, which is what lets modules refer to each other in
//!   any registration order.
//! - **Store (`Store`)**: `dispatch`, `get_state`, `get_state_stream`,
//!   `set_middleware`, `hydrate` and `clear_state`.
//! - **Deferred feedback**: streams read through a context deliver on the store
//!   scheduler's next turn, never in the call frame of the commit that produced them.
//!
//! ## Quick Start
//!
//! ```rust
//! use fluxon::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), StoreError> {
//! let todos = ModuleDefinition::new(
//!     |actions: &ActionBus, _context: &ModuleContext| Ok(vec![actions.filter_action("ADD_TODO")]),
//!     |state: Option<&serde_json::Value>, event: &Event| {
//!         let mut todos = state.cloned().unwrap_or_else(|| json!([]));
//!         if let (Some(list), Some(todo)) = (todos.as_array_mut(), event.payload()) {
//!             list.push(todo.clone());
//!         }
//!         Ok(todos)
//!     },
//! );
//!
//! let store = create_store_with_config([("todos", todos)], None, FluxonConfig::default())?;
//! store.dispatch(Event::new("ADD_TODO").with_payload(json!("write docs")))?;
//! assert_eq!(store.get_state()["todos"], json!(["write docs"]));
//! # Ok(())
//! # }
//! ```

/// Store construction, the façade and shared runtime components.
pub(crate) mod common;

/// The action bus.
pub(crate) mod message;

/// Module definitions and per-module runtimes.
pub(crate) mod module;

/// Configuration types.
pub mod config {
    pub use crate::common::config::{BehaviorConfig, FluxonConfig, LimitsConfig, SchedulerConfig};
}

/// A prelude module for conveniently importing the most commonly used items.
pub mod prelude {
    pub use fluxon_core::prelude::*;

    pub use crate::common::{
        create_store, create_store_with_config, FluxonConfig, Middleware, MiddlewareFn,
        ModuleContext, StateSnapshot, Store, StoreBuilder, StoreError,
    };
    pub use crate::message::ActionBus;
    pub use crate::module::{ModuleDefinition, ModuleLogic, TransitionFn, WiringFn};
}
