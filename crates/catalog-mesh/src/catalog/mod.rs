//! Thin adapter over an external Consul-style catalog.
//!
//! This module treats the catalog's wire protocol as opaque — it only knows
//! about the operation set in SPEC_FULL.md §4.1 (`register`/`deregister`/
//! `list_services`/`list_health_checks`/`list_datacenters`/KV get-set-list-
//! delete). The HTTP implementation in [`HttpCatalog`] is one concrete
//! binding; [`fake::FakeCatalog`] is an in-memory stand-in used by tests so
//! the rest of the crate never has to talk to a real registry.

mod http_catalog;
pub mod fake;

pub use http_catalog::HttpCatalog;

use crate::error::Result;
use crate::model::{Service, Status};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Namespace prefix every user KV key is stored under in the catalog.
pub const KV_PREFIX: &str = "registry/";

/// Health check descriptor accepted by [`Catalog::register`].
///
/// Mirrors the catalog's own check payload: either an HTTP URL or a TCP
/// endpoint, plus interval/timeout strings and a fixed 10-minute
/// deregister-after-critical period (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub interval: String,
    pub timeout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp: Option<String>,
    #[serde(rename = "deregister_critical_after")]
    pub deregister_critical_after: String,
}

impl CheckSpec {
    pub fn http(url: impl Into<String>, interval: impl Into<String>, timeout: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            timeout: timeout.into(),
            http: Some(url.into()),
            tcp: None,
            deregister_critical_after: "10m".to_string(),
        }
    }

    pub fn tcp(endpoint: impl Into<String>, interval: impl Into<String>, timeout: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            timeout: timeout.into(),
            http: None,
            tcp: Some(endpoint.into()),
            deregister_critical_after: "10m".to_string(),
        }
    }
}

/// One health check result, as returned by `list_health_checks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub service_id: String,
    pub status: String,
}

impl HealthCheck {
    pub fn status(&self) -> Status {
        Status::from_check_str(&self.status)
    }
}

/// Operations this crate needs from an external service catalog.
///
/// The address passed to `register` may be `scheme://host:port`, `host:port`,
/// or a bare `host`; implementations normalize it via URL parse then
/// host-port split, per SPEC_FULL.md §4.1.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn register(
        &self,
        id: &str,
        name: &str,
        address: &str,
        port: u16,
        tags: &[String],
        check: Option<CheckSpec>,
    ) -> Result<()>;

    async fn deregister(&self, id: &str) -> Result<()>;

    async fn list_services(&self, datacenter: &str) -> Result<Vec<Service>>;

    async fn list_health_checks(&self, name: &str, datacenter: &str) -> Result<Vec<HealthCheck>>;

    async fn list_datacenters(&self) -> Result<Vec<String>>;

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn kv_set(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn kv_list(&self, prefix: &str) -> Result<Vec<String>>;

    async fn kv_delete(&self, key: &str) -> Result<()>;
}

/// Normalizes a user-supplied address into `(host, port)`.
///
/// Accepts `scheme://host:port`, `host:port`, or a bare `host` (in which
/// case `default_port` is used).
pub fn normalize_address(address: &str, default_port: u16) -> Result<(String, u16)> {
    use crate::error::{CatalogError, Error};

    let without_scheme = address.split("://").last().unwrap_or(address);

    if let Some((host, port_str)) = without_scheme.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    if without_scheme.is_empty() {
        return Err(Error::Catalog(CatalogError::InvalidAddress {
            address: address.to_string(),
            reason: "empty host".to_string(),
        }));
    }

    Ok((without_scheme.to_string(), default_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_host_port() {
        assert_eq!(
            normalize_address("http://10.0.0.1:9000", 80).unwrap(),
            ("10.0.0.1".to_string(), 9000)
        );
    }

    #[test]
    fn normalizes_bare_host() {
        assert_eq!(normalize_address("10.0.0.1", 8080).unwrap(), ("10.0.0.1".to_string(), 8080));
    }

    #[test]
    fn normalizes_host_port_without_scheme() {
        assert_eq!(normalize_address("10.0.0.1:22", 8080).unwrap(), ("10.0.0.1".to_string(), 22));
    }
}
