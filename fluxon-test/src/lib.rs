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

//! Test support for Fluxon stores.
//!
//! The [`fluxon_test`](prelude::fluxon_test) attribute expands against the crates
//! re-exported here, so test crates need no direct dependency on them.

pub use parking_lot;
pub use tokio;
pub use tracing;

/// Brings the test attribute into scope.
pub mod prelude {
    pub use fluxon_test_macro::fluxon_test;
}
