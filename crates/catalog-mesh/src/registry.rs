//! Library entry point: parses a catalog DSN, wires up the catalog client,
//! discovery facade, and config binder, and owns the config refresh task.
//!
//! Grounded on `original_source/registry.go`'s `New`/`registry` type.

use crate::catalog::{Catalog, HttpCatalog};
use crate::config::refresh;
use crate::config::{default_lock, Bindable, BoundConfig, ConfigLock};
use crate::discovery::Discovery;
use crate::error::{Error, Result};
use log::warn;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

const DEFAULT_REFRESH_SECS: i64 = 30;

/// Parsed connection parameters from a registry DSN.
#[derive(Debug, Clone)]
struct Dsn {
    base_url: String,
    datacenter: String,
    token: Option<String>,
    refresh_interval: i64,
}

fn parse_dsn(dsn: &str) -> Result<Dsn> {
    let url = Url::parse(dsn).map_err(|e| Error::Parse { path: "dsn".to_string(), message: e.to_string() })?;

    let base_url = format!(
        "{}://{}",
        url.scheme(),
        url.host_str().map(|h| match url.port() {
            Some(p) => format!("{h}:{p}"),
            None => h.to_string(),
        })
        .unwrap_or_default()
    );

    let query: std::collections::HashMap<String, String> = url.query_pairs().into_owned().collect();
    let datacenter = query.get("dc").cloned().unwrap_or_default();
    let token = query.get("token").cloned();
    // Present and parseable -> honored as-is, including <= 0 (disables the
    // refresher); absent or unparseable -> falls back to the default.
    let refresh_interval =
        query.get("refresh_interval").and_then(|v| v.parse::<i64>().ok()).unwrap_or(DEFAULT_REFRESH_SECS);

    Ok(Dsn { base_url, datacenter, token, refresh_interval })
}

/// Owns one catalog connection: its discovery facade, bound configs, and
/// background refresh task.
pub struct Registry {
    catalog: Arc<dyn Catalog>,
    datacenter: String,
    argv: Vec<String>,
    configs: Arc<Mutex<Vec<BoundConfig>>>,
    refresh_interval: i64,
    refresh_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Registry {
    /// `dsn` identifies the catalog (see SPEC_FULL.md §6); `argv` is
    /// captured once for flag resolution in [`Registry::bind`].
    pub fn new(dsn: &str, argv: Vec<String>) -> Result<Arc<Self>> {
        let parsed = parse_dsn(dsn)?;
        let catalog: Arc<dyn Catalog> =
            Arc::new(HttpCatalog::new(parsed.base_url, parsed.datacenter.clone(), parsed.token));

        let registry = Arc::new(Self {
            catalog,
            datacenter: parsed.datacenter,
            argv,
            configs: Arc::new(Mutex::new(Vec::new())),
            refresh_interval: parsed.refresh_interval,
            refresh_task: std::sync::Mutex::new(None),
        });

        if registry.refresh_interval > 0 {
            let handle = refresh::spawn(
                Arc::clone(&registry.catalog),
                Arc::clone(&registry.configs),
                Duration::from_secs(registry.refresh_interval as u64),
            );
            *registry.refresh_task.lock().unwrap() = Some(handle);
        }

        Ok(registry)
    }

    /// Builds a [`Discovery`] facade over this registry's catalog.
    pub fn discovery(&self) -> Discovery {
        Discovery::new(Arc::clone(&self.catalog), self.datacenter.clone())
    }

    pub fn kv(&self) -> Arc<dyn Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Binds `target`'s fields (see [`Bindable`]) and registers it for the
    /// periodic KV refresh cycle, using a lock private to this config. Use
    /// [`Self::bind_locked`] to share a lock the caller already holds
    /// elsewhere for the same fields.
    pub async fn bind(&self, ident: impl Into<String>, target: &dyn Bindable) -> Result<()> {
        self.bind_locked(ident, target, default_lock()).await
    }

    /// Like [`Self::bind`], but with a caller-supplied lock. The refresher
    /// acquires it for the entire mutation pass of each refresh cycle, so
    /// code taking the same lock never observes a partially-applied update.
    pub async fn bind_locked(&self, ident: impl Into<String>, target: &dyn Bindable, lock: Arc<dyn ConfigLock>) -> Result<()> {
        let bound = BoundConfig::bind(ident, target, &self.argv, lock)?;
        self.configs.lock().await.push(bound);
        Ok(())
    }

    /// Forces an immediate config refresh cycle, outside the normal ticker.
    pub async fn refresh(&self) {
        let mut configs = self.configs.lock().await;
        refresh::refresh_once(self.catalog.as_ref(), &mut configs).await;
    }

    pub fn close(&self) {
        if let Some(handle) = self.refresh_task.lock().unwrap().take() {
            handle.abort();
        } else {
            warn!("registry close() called with no active refresh task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dsn_query_parameters() {
        let dsn = parse_dsn("http://consul.internal:8500?dc=dc1&token=secret&refresh_interval=60").unwrap();
        assert_eq!(dsn.base_url, "http://consul.internal:8500");
        assert_eq!(dsn.datacenter, "dc1");
        assert_eq!(dsn.token, Some("secret".to_string()));
        assert_eq!(dsn.refresh_interval, 60);
    }

    #[test]
    fn negative_refresh_interval_is_preserved_as_disable_sentinel() {
        let dsn = parse_dsn("http://consul.internal:8500?refresh_interval=-1").unwrap();
        assert_eq!(dsn.refresh_interval, -1);
    }

    #[test]
    fn defaults_when_query_absent() {
        let dsn = parse_dsn("http://consul.internal:8500").unwrap();
        assert_eq!(dsn.datacenter, "");
        assert_eq!(dsn.token, None);
        assert_eq!(dsn.refresh_interval, DEFAULT_REFRESH_SECS);
    }
}
