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

use std::sync::Arc;

use fluxon::prelude::*;
use fluxon_test::prelude::*;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::setup::modules::{noop, type_log};
use crate::setup::*;

mod setup;

/// One middleware call, as `(module, event, previous, next)`.
type Logged = (String, Value, Value, Value);

fn logger() -> (Middleware, Arc<Mutex<Vec<Logged>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let middleware = Middleware::new(
        move |module: &str, event: &Event, previous: &Value, next: &Value| {
            sink.lock().push((
                module.to_string(),
                event.to_value(),
                previous.clone(),
                next.clone(),
            ));
        },
    );
    (middleware, log)
}

#[fluxon_test]
async fn test_middleware_sees_every_commit() -> anyhow::Result<()> {
    initialize_tracing();
    let store = store_of(vec![
        ("fooModule", type_log(FOO)),
        ("barModule", type_log(BAR)),
    ]);
    let (middleware, log) = logger();
    store.set_middleware(Some(middleware));

    let foo = watch(&store, "fooModule");
    let bar = watch(&store, "barModule");

    store.dispatch(Event::new(FOO))?;
    assert_eq!(
        log.lock().last().cloned(),
        Some((
            "fooModule".to_string(),
            json!({ "type": FOO }),
            json!([]),
            json!([FOO]),
        ))
    );

    store.dispatch(Event::new(BAR))?;
    assert_eq!(
        log.lock().last().cloned(),
        Some((
            "barModule".to_string(),
            json!({ "type": BAR }),
            json!([]),
            json!([BAR]),
        ))
    );
    assert_eq!(log.lock().len(), 2);

    foo.stop();
    bar.stop();
    Ok(())
}

/// Middleware runs after the commit, so reading the store from it sees the new state.
#[fluxon_test]
async fn test_middleware_runs_after_commit() -> anyhow::Result<()> {
    initialize_tracing();
    let store = Arc::new(store_of(vec![("fooModule", type_log(FOO))]));
    let observed = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&store);
    let sink = observed.clone();
    store.set_middleware(Some(Middleware::new(
        move |_module: &str, _event: &Event, _previous: &Value, _next: &Value| {
            if let Some(store) = weak.upgrade() {
                *sink.lock() = Some(store.get_state()["fooModule"].clone());
            }
        },
    )));

    store.dispatch(Event::new(FOO))?;
    assert_eq!(observed.lock().clone(), Some(json!([FOO])));
    Ok(())
}

#[fluxon_test]
async fn test_middleware_can_be_replaced_and_removed() -> anyhow::Result<()> {
    initialize_tracing();
    let store = store_of(vec![("fooModule", type_log(FOO))]);
    let (first, first_log) = logger();
    let (second, second_log) = logger();

    store.set_middleware(Some(first));
    store.dispatch(Event::new(FOO))?;

    store.set_middleware(Some(second));
    store.dispatch(Event::new(FOO))?;

    store.set_middleware(None);
    store.dispatch(Event::new(FOO))?;

    assert_eq!(first_log.lock().len(), 1);
    assert_eq!(second_log.lock().len(), 1);
    assert_eq!(store.get_state()["fooModule"], json!([FOO, FOO, FOO]));
    Ok(())
}

/// Unchanged states are reported by default and skipped when configured.
#[fluxon_test]
async fn test_unchanged_states_reach_middleware_unless_configured() -> anyhow::Result<()> {
    initialize_tracing();
    let store = store_of(vec![("noopModule", noop())]);
    let (middleware, log) = logger();
    store.set_middleware(Some(middleware));
    store.dispatch(Event::new(FOO))?;
    assert_eq!(log.lock().len(), 1);

    let mut config = FluxonConfig::default();
    config.behavior.skip_middleware_when_unchanged = true;
    let quiet = create_store_with_config(vec![("noopModule", noop())], None, config)?;
    let (middleware, quiet_log) = logger();
    quiet.set_middleware(Some(middleware));
    quiet.dispatch(Event::new(FOO))?;
    assert!(quiet_log.lock().is_empty());
    Ok(())
}

/// Hydration bypasses transitions and therefore the middleware.
#[fluxon_test]
async fn test_hydrate_does_not_reach_middleware() -> anyhow::Result<()> {
    initialize_tracing();
    let store = store_of(vec![("fooModule", type_log(FOO))]);
    let (middleware, log) = logger();
    store.set_middleware(Some(middleware));

    let mut partial = StateSnapshot::new();
    partial.insert("fooModule".to_string(), json!([BAR]));
    store.hydrate(partial)?;
    store.clear_state()?;

    assert!(log.lock().is_empty());
    Ok(())
}
