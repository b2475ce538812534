//! Periodic KV refresh cycle over a set of bound configs.
//!
//! Grounded on `original_source/registry.go`'s `refresh()`: batch-read every
//! tracked key, then for each config compare-and-set each changed item
//! before firing its `OnUpdate<Field>` hooks outside the lock.

use super::{BoundConfig, FieldValue};
use crate::catalog::Catalog;
use log::{error, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Runs one refresh pass over `configs` against `catalog`'s KV store.
///
/// A failed fetch for one key simply leaves that key unchanged this cycle —
/// per SPEC_FULL.md §4.7, no error surfaces to the caller for that case.
pub async fn refresh_once(catalog: &dyn Catalog, configs: &mut [BoundConfig]) {
    let mut keys: Vec<String> = Vec::new();
    for config in configs.iter() {
        keys.extend(config.registry_keys().into_iter().map(str::to_string));
    }
    keys.sort();
    keys.dedup();

    let mut values: HashMap<String, String> = HashMap::new();
    for key in &keys {
        match catalog.kv_get(key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(value) => {
                    values.insert(key.clone(), value);
                }
                Err(err) => warn!("config refresh: key {key} is not valid UTF-8: {err}"),
            },
            Ok(None) => {}
            Err(err) => warn!("config refresh: fetching {key} failed: {err}"),
        }
    }

    for config in configs.iter_mut() {
        let mut updated_paths = Vec::new();
        let items = &config.items;

        // Held for the whole mutation pass so a reader taking the same lock
        // sees either all of this cycle's changes or none of them.
        config.lock.locked(&mut || {
            for item in items {
                let Some(key) = &item.registry_key else { continue };
                let Some(raw) = values.get(key) else { continue };

                let parsed = match super::parse_value(&item.path, item.kind, raw) {
                    Ok(v) => v,
                    Err(err) => {
                        warn!("config refresh: {err}");
                        continue;
                    }
                };

                if fields_equal(&(item.get)(), &parsed) {
                    continue;
                }

                (item.set)(parsed);
                updated_paths.push(item.path.clone());
            }
        });

        for path in updated_paths {
            if let Some(hook) = config.on_update.get(&path) {
                // Hooks run outside any field lock; a panicking hook must
                // not take the refresher down with it.
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook())).is_err() {
                    error!("config refresh: OnUpdate hook for {path} in {} panicked", config.ident);
                }
            }
        }
    }
}

fn fields_equal(a: &FieldValue, b: &FieldValue) -> bool {
    a == b
}

/// Spawns a task that runs [`refresh_once`] every `interval`, until the
/// returned handle is aborted.
pub fn spawn(
    catalog: Arc<dyn Catalog>,
    configs: Arc<tokio::sync::Mutex<Vec<BoundConfig>>>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let mut configs = configs.lock().await;
            refresh_once(catalog.as_ref(), &mut configs).await;
        }
    })
}
