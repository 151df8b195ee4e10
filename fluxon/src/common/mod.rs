//! Store construction, the store façade and the runtime components shared across the crate.
//!
//! # Key Re-exported Components:
//!
//! *   [`Store`]: The public façade (`dispatch`, `get_state`, `get_state_stream`,
//!     `set_middleware`, `hydrate`, `clear_state`).
//! *   [`StoreBuilder`], [`create_store`], [`create_store_with_config`]: Construction.
//! *   [`ModuleContext`]: The read capability handed to each module's wiring.
//! *   [`FluxonConfig`]: Configuration loaded from XDG-compliant locations.
//! *   [`StoreError`]: Every error the store reports.

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

// --- Public Re-exports ---
pub use config::FluxonConfig;
pub use context::ModuleContext;
pub use error::StoreError;
pub use store::{create_store, create_store_with_config, Store, StoreBuilder};
pub use types::*;

// --- Submodules ---

/// Defines common type aliases and the `Middleware` hook.
mod types;

/// Defines the configuration system for Fluxon stores.
pub mod config;
/// Defines per-module context handles and their registry.
mod context;
/// Defines `StoreError`.
mod error;
/// Defines the deferred-turn scheduler.
mod scheduler;
/// Defines the public `Store` façade and its builder.
mod store;
/// Defines the internal state (`StoreInner`) of a store.
mod store_inner;
/// Defines two-phase activation.
mod wiring;
