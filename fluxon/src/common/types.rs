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
use std::sync::Arc;

use fluxon_core::prelude::Event;
use serde_json::Value;

/// Immutable mapping of module name to state.
pub type StateSnapshot = serde_json::Map<String, Value>;

/// Signature of the function behind a [`Middleware`]: `(module, event, previous, next)`.
pub type MiddlewareFn = dyn Fn(&str, &Event, &Value, &Value) + Send + Sync;

/// An observer invoked synchronously after every committed state update.
///
/// Cloning is cheap; clones call the same function.
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareFn>);

impl Middleware {
    /// Wraps `hook`, which receives `(module, event, previous, next)`.
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&str, &Event, &Value, &Value) + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    #[inline]
    pub(crate) fn call(&self, module: &str, event: &Event, previous: &Value, next: &Value) {
        (self.0)(module, event, previous, next);
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}
