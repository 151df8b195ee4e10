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
use fluxon_test::prelude::*;
use serde_json::json;

use crate::setup::modules::type_log;
use crate::setup::*;

mod setup;

#[fluxon_test]
async fn test_hydrate_overwrites_named_modules() -> anyhow::Result<()> {
    initialize_tracing();
    let store = store_of(vec![
        ("fooModule", type_log(FOO)),
        ("barModule", type_log(BAR)),
    ]);
    let foo = watch(&store, "fooModule");
    store.dispatch(Event::new(BAR))?;

    let mut partial = StateSnapshot::new();
    partial.insert("fooModule".to_string(), json!(["restored"]));
    store.hydrate(partial)?;

    assert_eq!(foo.latest(), Some(json!(["restored"])));
    assert_eq!(store.get_state()["barModule"], json!([BAR]));

    // Later folds start from the hydrated state.
    store.dispatch(Event::new(FOO))?;
    assert_eq!(foo.latest(), Some(json!(["restored", FOO])));
    foo.stop();
    Ok(())
}

#[fluxon_test]
async fn test_hydrate_rejects_unknown_modules_atomically() -> anyhow::Result<()> {
    initialize_tracing();
    let store = store_of(vec![("fooModule", type_log(FOO))]);

    let mut partial = StateSnapshot::new();
    partial.insert("fooModule".to_string(), json!(["restored"]));
    partial.insert("ghostModule".to_string(), json!(1));

    assert!(matches!(
        store.hydrate(partial),
        Err(StoreError::UnknownModule(name)) if name == "ghostModule"
    ));
    assert_eq!(store.get_state()["fooModule"], empty_list());
    Ok(())
}

#[fluxon_test]
async fn test_clear_state_restores_defaults() -> anyhow::Result<()> {
    initialize_tracing();
    let mut preloaded = StateSnapshot::new();
    preloaded.insert("fooModule".to_string(), json!(["preloaded"]));
    let store = create_store_with_config(
        vec![("fooModule", type_log(FOO)), ("barModule", type_log(BAR))],
        Some(preloaded),
        FluxonConfig::default(),
    )?;
    let foo = watch(&store, "fooModule");

    store.dispatch(Event::new(FOO))?;
    store.dispatch(Event::new(BAR))?;
    store.clear_state()?;

    // Defaults, not the preloaded state.
    assert_eq!(foo.latest(), Some(empty_list()));
    assert_eq!(store.get_state()["barModule"], empty_list());

    store.dispatch(Event::new(FOO))?;
    assert_eq!(foo.latest(), Some(json!([FOO])));
    foo.stop();
    Ok(())
}

/// Context state streams pick up hydrated state like any other commit.
#[fluxon_test]
async fn test_hydrated_state_reaches_context_streams() -> anyhow::Result<()> {
    initialize_tracing();
    let mirror = ModuleDefinition::new(
        |_actions: &ActionBus, context: &ModuleContext| {
            let mirrored = context.get_state_stream("fooModule")?.map_action("MIRROR");
            Ok(vec![mirrored])
        },
        |state: Option<&serde_json::Value>, event: &Event| {
            Ok(match event.kind() {
                "MIRROR" => event.payload().cloned().unwrap_or_default(),
                _ => state.cloned().unwrap_or_else(empty_list),
            })
        },
    );
    let store = store_of(vec![("mirror", mirror), ("fooModule", type_log(FOO))]);

    let mut partial = StateSnapshot::new();
    partial.insert("fooModule".to_string(), json!(["restored"]));
    store.hydrate(partial)?;
    settle().await;

    assert_eq!(store.get_state()["mirror"], json!(["restored"]));
    Ok(())
}
