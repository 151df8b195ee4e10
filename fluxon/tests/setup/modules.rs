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

use fluxon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Folds every event on the bus and never changes its state.
pub fn noop() -> ModuleDefinition {
    ModuleDefinition::passthrough(|state: Option<&Value>, _event: &Event| {
        Ok(state.cloned().unwrap_or(Value::Null))
    })
}

/// Selects events of `kind` and appends each one's type to a list.
pub fn type_log(kind: &'static str) -> ModuleDefinition {
    ModuleDefinition::new(
        move |actions: &ActionBus, _context: &ModuleContext| Ok(vec![actions.filter_action(kind)]),
        move |state: Option<&Value>, event: &Event| {
            let mut log = state.cloned().unwrap_or_else(|| json!([]));
            if event.kind() == kind {
                if let Some(entries) = log.as_array_mut() {
                    entries.push(json!(event.kind()));
                }
            }
            Ok(log)
        },
    )
}

/// Selects events of `kind` and appends each one's payload to a list.
pub fn payload_log(kind: &'static str) -> ModuleDefinition {
    ModuleDefinition::new(
        move |actions: &ActionBus, _context: &ModuleContext| Ok(vec![actions.filter_action(kind)]),
        move |state: Option<&Value>, event: &Event| Ok(append_payload(state, event, kind)),
    )
}

/// `state` (a list, empty by default) with `event`'s payload appended when its type is `kind`.
pub fn append_payload(state: Option<&Value>, event: &Event, kind: &str) -> Value {
    let mut log = state.cloned().unwrap_or_else(|| json!([]));
    if event.kind() == kind {
        if let Some(entries) = log.as_array_mut() {
            entries.push(event.payload().cloned().unwrap_or(Value::Null));
        }
    }
    log
}

/// A constant module whose default state is `state`.
pub fn constant(state: Value) -> ModuleDefinition {
    ModuleDefinition::new(
        |actions: &ActionBus, _context: &ModuleContext| {
            Ok(vec![actions.filter_action("@test/NEVER")])
        },
        move |current: Option<&Value>, _event: &Event| {
            Ok(current.cloned().unwrap_or_else(|| state.clone()))
        },
    )
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledState {
    pub foo: Vec<Value>,
    pub bar: Vec<Value>,
    #[serde(rename = "peakyEffect")]
    pub peaky_effect: Vec<Value>,
    pub shoot: Vec<Value>,
}

/// One of many identically shaped modules, keyed by `count`.
///
/// Besides folding its own `SOME_FOO_n` / `SOME_BAR_n` events it derives a
/// `PEAKY_EFFECT_n` event from large foos and small bars.
pub fn scaled(count: usize) -> ModuleDefinition {
    let some_foo = format!("SOME_FOO_{count}");
    let some_bar = format!("SOME_BAR_{count}");
    let peaky_effect = format!("PEAKY_EFFECT_{count}");
    let shoot = format!("SHOOT_{count}");
    let shoot_pool = format!("SHOOT_POOL_{count}");
    let shoot_some_pool = format!("SHOOT_SOME_POOL_{count}");

    let (foo, bar, peaky, shot) = (
        some_foo.clone(),
        some_bar.clone(),
        peaky_effect.clone(),
        shoot.clone(),
    );

    ModuleDefinition::typed::<ScaledState, _, _>(
        move |actions: &ActionBus, _context: &ModuleContext| {
            let foo_events = actions.filter_action(some_foo.as_str());
            let bar_events = actions.filter_action(some_bar.as_str());

            let tommy = foo_events
                .pluck_payload(&[])
                .filter(|foo: &Value| foo.as_i64().is_some_and(|foo| foo > 42))
                .map(|_: &Value| json!("Tommy"));
            let arthur = bar_events
                .pluck_payload(&[])
                .filter(|bar: &Value| bar.as_i64().is_some_and(|bar| bar < 42))
                .map(|_: &Value| json!("Arthur"));
            let peaky_events = tommy.merge_with(&arthur).map_action(peaky_effect.as_str());

            Ok(vec![
                foo_events,
                bar_events,
                peaky_events,
                actions.filter_action(shoot.as_str()),
                actions.filter_action(shoot_pool.as_str()),
                actions.filter_action(shoot_some_pool.as_str()),
            ])
        },
        move |mut state: ScaledState, event: &Event| {
            let payload = event.payload().cloned().unwrap_or(Value::Null);
            let kind = event.kind();
            if kind == foo {
                state.foo.push(payload);
            } else if kind == bar {
                state.bar.push(payload);
            } else if kind == peaky {
                state.peaky_effect.push(payload);
            } else if kind == shot {
                state.shoot.push(payload);
            }
            Ok(state)
        },
    )
}
