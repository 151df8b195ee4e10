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
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use fluxon::prelude::*;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Declare the submodules.
pub mod modules;

pub const FOO: &str = "@test/FOO";
pub const BAR: &str = "@test/BAR";

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests.
///
/// Output goes to `logs/fluxon_tests.txt`. `std::sync::Once` keeps this idempotent
/// when several tests in one binary call it.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        std::fs::create_dir_all("logs").expect("could not create logs dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, "logs", "fluxon_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the non-blocking writer is not dropped before process exit
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("info")
            .add_directive("fluxon=trace".parse().unwrap())
            .add_directive("fluxon_core=debug".parse().unwrap());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_target(true)
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// A store built with default configuration, ignoring any config file on the machine.
pub fn store_of(modules: Vec<(&str, ModuleDefinition)>) -> Store {
    create_store_with_config(modules, None, FluxonConfig::default()).expect("store should build")
}

/// Records every value a stream delivers.
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
    subscription: Subscription,
}

impl<T: Clone + Send + Sync + 'static> Recorder<T> {
    pub fn attach(stream: &Stream<T>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = stream.subscribe(move |value: &T| sink.lock().push(value.clone()));
        Self { seen, subscription }
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.lock().clone()
    }

    pub fn latest(&self) -> Option<T> {
        self.seen.lock().last().cloned()
    }

    pub fn stop(self) {
        self.subscription.unsubscribe();
    }
}

/// Records `name`'s state stream.
pub fn watch(store: &Store, name: &str) -> Recorder<Value> {
    Recorder::attach(&store.get_state_stream(name).expect("module should exist"))
}

/// Lets the store scheduler run the turns queued so far, and the ones they queue.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// The payload of `event` as an integer, or zero.
pub fn payload_i64(event: &Event) -> i64 {
    event.payload().and_then(Value::as_i64).unwrap_or(0)
}

/// An empty JSON array.
pub fn empty_list() -> Value {
    json!([])
}
