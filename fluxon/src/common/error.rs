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

/// Errors reported by store construction and the store façade.
#[derive(Debug)]
pub enum StoreError {
    /// A module name that was never registered.
    UnknownModule(String),
    /// Two modules registered under the same name.
    DuplicateModule(String),
    /// An event that cannot be dispatched, such as one with an empty type.
    InvalidEvent(String),
    /// A transition faulted while computing a module's default state.
    Initialization {
        /// Module whose INIT fold failed.
        module: String,
        /// The transition's fault.
        source: anyhow::Error,
    },
    /// A module's wiring failed during activation.
    Wiring {
        /// Module whose wiring failed.
        module: String,
        /// The wiring's fault.
        source: anyhow::Error,
    },
    /// A transition faulted while folding a dispatched event.
    ///
    /// The module keeps its last committed state; other modules still folded the event.
    Transition {
        /// Module whose transition failed.
        module: String,
        /// Type of the event being folded.
        event_type: String,
        /// The transition's fault.
        source: anyhow::Error,
    },
    /// `dispatch` was re-entered more deeply than the configured limit allows.
    DispatchDepthExceeded(usize),
    /// The deferred-turn scheduler could not be started.
    Scheduler(String),
    /// A fault raised by a stream operator or subscriber rather than by a transition.
    Stream(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownModule(name) => write!(f, "No module named '{name}' is registered"),
            StoreError::DuplicateModule(name) => {
                write!(f, "A module named '{name}' is already registered")
            }
            StoreError::InvalidEvent(reason) => write!(f, "Invalid event: {reason}"),
            StoreError::Initialization { module, source } => {
                write!(
                    f,
                    "Module '{module}' failed to compute its initial state: {source}"
                )
            }
            StoreError::Wiring { module, source } => {
                write!(
                    f,
                    "Module '{module}' failed to wire its input streams: {source}"
                )
            }
            StoreError::Transition {
                module,
                event_type,
                source,
            } => write!(
                f,
                "Module '{module}' failed to fold event '{event_type}': {source}"
            ),
            StoreError::DispatchDepthExceeded(depth) => {
                write!(f, "Nested dispatch depth exceeded the limit of {depth}")
            }
            StoreError::Scheduler(msg) => write!(f, "Scheduler error: {msg}"),
            StoreError::Stream(source) => write!(f, "Stream error: {source}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Initialization { source, .. }
            | StoreError::Wiring { source, .. }
            | StoreError::Transition { source, .. }
            | StoreError::Stream(source) => Some(&**source),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StoreError {
    /// Recovers a `StoreError` that travelled through a stream as an `anyhow::Error`.
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<StoreError>() {
            Ok(store_error) => store_error,
            Err(other) => StoreError::Stream(other),
        }
    }
}
