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

use std::time::Instant;

use fluxon::prelude::*;
use fluxon_test::prelude::*;
use serde_json::json;
use tracing::info;

use crate::setup::modules::{scaled, ScaledState};
use crate::setup::*;

mod setup;

fn scaled_state(value: &serde_json::Value) -> anyhow::Result<ScaledState> {
    Ok(serde_json::from_value(value.clone())?)
}

#[fluxon_test]
async fn test_many_modules() -> anyhow::Result<()> {
    initialize_tracing();
    let modules: Vec<(String, ModuleDefinition)> = (0..250)
        .map(|count| (format!("module{count}"), scaled(count)))
        .collect();

    let started = Instant::now();
    let store = create_store_with_config(modules, None, FluxonConfig::default())?;
    info!(elapsed = ?started.elapsed(), "built store of 250 modules");

    let watchers: Vec<Recorder<serde_json::Value>> = (1..=10)
        .map(|tenth| watch(&store, &format!("module{}", tenth * 10)))
        .collect();

    let started = Instant::now();
    store.dispatch(Event::new("SOME_FOO_20").with_payload(json!(40)))?;
    info!(elapsed = ?started.elapsed(), "dispatched SOME_FOO_20");
    assert_eq!(
        scaled_state(&store.get_state()["module20"])?,
        ScaledState {
            foo: vec![json!(40)],
            ..ScaledState::default()
        }
    );

    store.dispatch(Event::new("SOME_BAR_60").with_payload(json!(40)))?;
    for count in [70, 80, 90, 100] {
        let event = Event::new(format!("SOME_BAR_{count}")).with_payload(json!(10));
        store.dispatch(event)?;
    }

    settle().await;
    let state = store.get_state();
    assert_eq!(
        scaled_state(&state["module20"])?,
        ScaledState {
            foo: vec![json!(40)],
            ..ScaledState::default()
        }
    );
    assert_eq!(
        scaled_state(&state["module60"])?,
        ScaledState {
            bar: vec![json!(40)],
            peaky_effect: vec![json!("Arthur")],
            ..ScaledState::default()
        }
    );
    assert_eq!(state["module60"]["peakyEffect"], json!(["Arthur"]));
    assert_eq!(state["module100"]["peakyEffect"], json!(["Arthur"]));
    assert_eq!(state["module0"]["foo"], json!([]));

    for watcher in watchers {
        watcher.stop();
    }
    Ok(())
}
