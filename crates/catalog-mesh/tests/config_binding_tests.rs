//! Integration tests for the reflection-free config binder: precedence
//! resolution at bind time, and KV-driven refresh with `on_update` hooks.

use catalog_mesh::catalog::fake::FakeCatalog;
use catalog_mesh::catalog::Catalog;
use catalog_mesh::config::refresh::refresh_once;
use catalog_mesh::config::{default_lock, Bindable, FieldKind, FieldSpec, FieldValue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct ServiceSettings {
    port: Arc<Mutex<u16>>,
    max_retry: Arc<Mutex<u32>>,
    name: Arc<Mutex<String>>,
}

impl Bindable for ServiceSettings {
    fn fields(&self) -> Vec<FieldSpec> {
        let (port_set, port_get) = (self.port.clone(), self.port.clone());
        let (retry_set, retry_get) = (self.max_retry.clone(), self.max_retry.clone());
        let (name_set, name_get) = (self.name.clone(), self.name.clone());
        vec![
            FieldSpec {
                path: "port".to_string(),
                kind: FieldKind::U16,
                default: Some("8080".to_string()),
                env: Some("CATALOG_MESH_TEST_PORT".to_string()),
                flag: Some("port".to_string()),
                registry_key: Some("service/port".to_string()),
                get: Box::new(move || FieldValue::U16(*port_get.lock().unwrap())),
                set: Box::new(move |v| {
                    if let FieldValue::U16(v) = v {
                        *port_set.lock().unwrap() = v;
                    }
                }),
            },
            FieldSpec {
                path: "max_retry".to_string(),
                kind: FieldKind::U32,
                default: Some("2".to_string()),
                env: None,
                flag: None,
                registry_key: Some("service/max_retry".to_string()),
                get: Box::new(move || FieldValue::U32(*retry_get.lock().unwrap())),
                set: Box::new(move |v| {
                    if let FieldValue::U32(v) = v {
                        *retry_set.lock().unwrap() = v;
                    }
                }),
            },
            FieldSpec {
                path: "name".to_string(),
                kind: FieldKind::String,
                default: Some("unnamed".to_string()),
                env: None,
                flag: None,
                registry_key: None,
                get: Box::new(move || FieldValue::String(name_get.lock().unwrap().clone())),
                set: Box::new(move |v| {
                    if let FieldValue::String(v) = v {
                        *name_set.lock().unwrap() = v;
                    }
                }),
            },
        ]
    }
}

fn new_settings() -> ServiceSettings {
    ServiceSettings {
        port: Arc::new(Mutex::new(0)),
        max_retry: Arc::new(Mutex::new(0)),
        name: Arc::new(Mutex::new(String::new())),
    }
}

#[test]
fn flag_overrides_default_and_env() {
    std::env::set_var("CATALOG_MESH_TEST_PORT", "7000");
    let settings = new_settings();
    let argv = vec!["--port=9090".to_string()];
    let bound = catalog_mesh::config::BoundConfig::bind("ServiceSettings", &settings, &argv, default_lock()).unwrap();
    assert_eq!(*settings.port.lock().unwrap(), 9090);
    assert_eq!(bound.ident(), "ServiceSettings");
    std::env::remove_var("CATALOG_MESH_TEST_PORT");
}

#[test]
fn env_overrides_default_when_no_flag_given() {
    std::env::set_var("CATALOG_MESH_TEST_PORT", "7000");
    let settings = new_settings();
    catalog_mesh::config::BoundConfig::bind("ServiceSettings", &settings, &[], default_lock()).unwrap();
    assert_eq!(*settings.port.lock().unwrap(), 7000);
    std::env::remove_var("CATALOG_MESH_TEST_PORT");
}

#[test]
fn unset_fields_fall_back_to_default() {
    let settings = new_settings();
    catalog_mesh::config::BoundConfig::bind("ServiceSettings", &settings, &[], default_lock()).unwrap();
    assert_eq!(*settings.max_retry.lock().unwrap(), 2);
    assert_eq!(*settings.name.lock().unwrap(), "unnamed");
}

#[tokio::test]
async fn refresh_cycle_applies_kv_changes_and_fires_hooks() {
    let catalog = FakeCatalog::new();
    catalog.kv_set("service/port", b"9500").await.unwrap();

    let settings = new_settings();
    let mut bound = catalog_mesh::config::BoundConfig::bind("ServiceSettings", &settings, &[], default_lock()).unwrap();

    let hook_fired = Arc::new(AtomicBool::new(false));
    let hook_fired_clone = hook_fired.clone();
    bound.on_update("port", move || hook_fired_clone.store(true, Ordering::SeqCst));

    refresh_once(&catalog, std::slice::from_mut(&mut bound)).await;

    assert_eq!(*settings.port.lock().unwrap(), 9500);
    assert!(hook_fired.load(Ordering::SeqCst));

    // A second pass over an unchanged KV value must not re-fire the hook.
    hook_fired.store(false, Ordering::SeqCst);
    refresh_once(&catalog, std::slice::from_mut(&mut bound)).await;
    assert!(!hook_fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn refresh_leaves_fields_with_no_registry_key_untouched() {
    let catalog = FakeCatalog::new();
    catalog.kv_set("service/does-not-exist", b"x").await.unwrap();

    let settings = new_settings();
    let mut bound = catalog_mesh::config::BoundConfig::bind("ServiceSettings", &settings, &[], default_lock()).unwrap();
    refresh_once(&catalog, std::slice::from_mut(&mut bound)).await;

    assert_eq!(*settings.name.lock().unwrap(), "unnamed");
}
