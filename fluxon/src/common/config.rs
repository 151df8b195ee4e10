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

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Configuration for a Fluxon store.
///
/// Every store carries its own copy; there is no process-wide instance. Values are read
/// from TOML files in XDG-compliant directories by [`FluxonConfig::load`], and any
/// section or key left out of the file keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxonConfig {
    /// Deferred-turn scheduler settings
    pub scheduler: SchedulerConfig,
    /// Limits enforced while the store runs
    pub limits: LimitsConfig,
    /// Behavioral switches
    pub behavior: BehaviorConfig,
}

/// Settings for the task queue that runs deferred turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name of the dedicated thread used when the store is built outside a tokio runtime
    pub thread_name: String,
    /// Tasks run back to back before the driver yields to the runtime
    pub batch_limit: usize,
}

/// Limits enforced while the store runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Deepest allowed nesting of `dispatch` calls made from middleware or subscribers
    pub max_dispatch_depth: usize,
}

/// Behavioral configuration switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Warn once per event type that no module pipeline folded
    pub report_unhandled_events: bool,
    /// Skip the middleware when a transition returns a state equal to the previous one
    pub skip_middleware_when_unchanged: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name: "fluxon-scheduler".to_string(),
            batch_limit: 64,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 32,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            report_unhandled_events: true,
            skip_middleware_when_unchanged: false,
        }
    }
}

impl FluxonConfig {
    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `fluxon/config.toml` under `$XDG_CONFIG_HOME`, then under each of
    /// `$XDG_CONFIG_DIRS`.
    ///
    /// If no configuration file is found, returns the default configuration.
    /// If a configuration file exists but is malformed, logs an error and uses defaults.
    #[must_use]
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("fluxon") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        match xdg_dirs.find_config_file("config.toml") {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit file, falling back to defaults on any failure.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(path) {
            Ok(config_str) => match toml::from_str::<Self>(&config_str) {
                Ok(config) => {
                    info!("Successfully loaded configuration");
                    config
                }
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
