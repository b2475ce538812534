//! In-memory [`Catalog`] used by this crate's own tests and available to
//! downstream embedders that want to exercise discovery/balancer wiring
//! without a real catalog agent running.

use super::{Catalog, CheckSpec, HealthCheck};
use crate::error::Result;
use crate::model::{Service, Status};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    services: HashMap<String, Service>,
    kv: HashMap<String, Vec<u8>>,
}

/// Thread-safe, process-local stand-in for a catalog agent.
pub struct FakeCatalog {
    state: Mutex<State>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()) }
    }

    /// Directly seeds a service entry, bypassing `register`, so tests can
    /// set up a fixed `Status` without going through the check pipeline.
    pub fn seed(&self, service: Service) {
        let mut state = self.state.lock().unwrap();
        state.services.insert(service.id.clone(), service);
    }

    pub fn set_status(&self, id: &str, status: Status) {
        let mut state = self.state.lock().unwrap();
        if let Some(svc) = state.services.get_mut(id) {
            svc.status = status;
        }
    }
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn register(
        &self,
        id: &str,
        name: &str,
        address: &str,
        port: u16,
        tags: &[String],
        _check: Option<CheckSpec>,
    ) -> Result<()> {
        let datacenter = tags
            .iter()
            .find_map(|t| t.strip_prefix("DC="))
            .unwrap_or("dc1")
            .to_string();
        let mut state = self.state.lock().unwrap();
        state.services.insert(
            id.to_string(),
            Service {
                id: id.to_string(),
                name: name.to_string(),
                datacenter,
                address: address.to_string(),
                port,
                tags: tags.to_vec(),
                status: Status::Passing,
            },
        );
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        self.state.lock().unwrap().services.remove(id);
        Ok(())
    }

    async fn list_services(&self, datacenter: &str) -> Result<Vec<Service>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .services
            .values()
            .filter(|s| s.datacenter == datacenter)
            .cloned()
            .collect())
    }

    async fn list_health_checks(&self, name: &str, datacenter: &str) -> Result<Vec<HealthCheck>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .services
            .values()
            .filter(|s| s.name == name && s.datacenter == datacenter)
            .map(|s| HealthCheck {
                service_id: s.id.clone(),
                status: match s.status {
                    Status::Passing => "passing",
                    Status::Warning => "warning",
                    Status::Critical => "critical",
                    Status::Undefined => "undefined",
                }
                .to_string(),
            })
            .collect())
    }

    async fn list_datacenters(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut dcs: Vec<String> = state.services.values().map(|s| s.datacenter.clone()).collect();
        dcs.sort();
        dcs.dedup();
        Ok(dcs)
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.state.lock().unwrap().kv.get(key).cloned())
    }

    async fn kv_set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.state.lock().unwrap().kv.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn kv_list(&self, prefix: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.kv.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn kv_delete(&self, key: &str) -> Result<()> {
        self.state.lock().unwrap().kv.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_list_round_trips() {
        let catalog = FakeCatalog::new();
        catalog
            .register("svc-1", "web", "10.0.0.1", 8080, &["DC=dc1".to_string()], None)
            .await
            .unwrap();

        let services = catalog.list_services("dc1").await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, "svc-1");
    }

    #[tokio::test]
    async fn deregister_removes_entry() {
        let catalog = FakeCatalog::new();
        catalog.register("svc-1", "web", "10.0.0.1", 8080, &[], None).await.unwrap();
        catalog.deregister("svc-1").await.unwrap();
        assert!(catalog.list_services("dc1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn kv_set_get_delete() {
        let catalog = FakeCatalog::new();
        catalog.kv_set("feature/flag", b"on").await.unwrap();
        assert_eq!(catalog.kv_get("feature/flag").await.unwrap(), Some(b"on".to_vec()));
        catalog.kv_delete("feature/flag").await.unwrap();
        assert_eq!(catalog.kv_get("feature/flag").await.unwrap(), None);
    }
}
