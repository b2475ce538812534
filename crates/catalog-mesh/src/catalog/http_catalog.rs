use super::{normalize_address, Catalog, CheckSpec, HealthCheck, KV_PREFIX};
use crate::error::{CatalogError, Error, Result};
use crate::model::{Service, Status};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// HTTP binding for [`Catalog`] against a Consul-style REST API.
///
/// Built with a single pooled `reqwest::Client`, the same way
/// `services/http.rs`'s `RouteHandler` builds its upstream client — one
/// client per `HttpCatalog`, shared and cloned cheaply across callers.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    datacenter: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, datacenter: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            datacenter: datacenter.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            req = req.header("X-Catalog-Token", token.clone());
        }
        req
    }

    async fn check_status(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(Error::Catalog(CatalogError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            }))
        }
    }
}

#[derive(Serialize)]
struct RegisterPayload<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Address")]
    address: &'a str,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Tags")]
    tags: &'a [String],
    #[serde(rename = "Check", skip_serializing_if = "Option::is_none")]
    check: Option<CheckSpec>,
}

#[derive(Deserialize)]
struct CatalogServiceEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Service")]
    name: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn register(
        &self,
        id: &str,
        name: &str,
        address: &str,
        port: u16,
        tags: &[String],
        check: Option<CheckSpec>,
    ) -> Result<()> {
        let (host, port) = normalize_address(&format!("{address}:{port}"), port)?;
        let mut full_tags = tags.to_vec();
        full_tags.push(format!("DC={}", self.datacenter));

        debug!("registering service {id} ({name}) at {host}:{port}");

        let url = self.url("/v1/agent/service/register");
        let resp = self
            .request(reqwest::Method::PUT, "/v1/agent/service/register")
            .json(&RegisterPayload { id, name, address: &host, port, tags: &full_tags, check })
            .send()
            .await
            .map_err(CatalogError::Http)?;
        Self::check_status(resp, &url).await?;
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        let path = format!("/v1/agent/service/deregister/{id}");
        let url = self.url(&path);
        let resp = self.request(reqwest::Method::PUT, &path).send().await.map_err(CatalogError::Http)?;
        Self::check_status(resp, &url).await?;
        Ok(())
    }

    async fn list_services(&self, datacenter: &str) -> Result<Vec<Service>> {
        let path = format!("/v1/catalog/services?dc={datacenter}");
        let url = self.url(&path);
        let resp = self.request(reqwest::Method::GET, &path).send().await.map_err(CatalogError::Http)?;
        let resp = Self::check_status(resp, &url).await?;
        let entries: Vec<CatalogServiceEntry> =
            resp.json().await.map_err(CatalogError::Decode)?;

        Ok(entries
            .into_iter()
            .map(|e| Service {
                id: e.id,
                name: e.name,
                datacenter: datacenter.to_string(),
                address: e.address,
                port: e.port,
                tags: e.tags,
                status: Status::Undefined,
            })
            .collect())
    }

    async fn list_health_checks(&self, name: &str, datacenter: &str) -> Result<Vec<HealthCheck>> {
        let path = format!("/v1/health/checks/{name}?dc={datacenter}");
        let url = self.url(&path);
        let resp = self.request(reqwest::Method::GET, &path).send().await.map_err(CatalogError::Http)?;
        let resp = Self::check_status(resp, &url).await?;
        let checks: Vec<HealthCheck> =
            resp.json().await.map_err(CatalogError::Decode)?;
        Ok(checks)
    }

    async fn list_datacenters(&self) -> Result<Vec<String>> {
        let url = self.url("/v1/catalog/datacenters");
        let resp = self.request(reqwest::Method::GET, "/v1/catalog/datacenters").send().await.map_err(CatalogError::Http)?;
        let resp = Self::check_status(resp, &url).await?;
        let dcs: Vec<String> = resp.json().await.map_err(CatalogError::Decode)?;
        Ok(dcs)
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = format!("/v1/kv/{KV_PREFIX}{key}?raw");
        let url = self.url(&path);
        let resp = self.request(reqwest::Method::GET, &path).send().await.map_err(CatalogError::Http)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check_status(resp, &url).await?;
        let bytes = resp.bytes().await.map_err(CatalogError::Http)?;
        Ok(Some(bytes.to_vec()))
    }

    async fn kv_set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = format!("/v1/kv/{KV_PREFIX}{key}");
        let url = self.url(&path);
        let resp = self
            .request(reqwest::Method::PUT, &path)
            .body(value.to_vec())
            .send()
            .await
            .map_err(CatalogError::Http)?;
        Self::check_status(resp, &url).await?;
        Ok(())
    }

    async fn kv_list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = format!("/v1/kv/{KV_PREFIX}{prefix}?keys");
        let url = self.url(&path);
        let resp = self.request(reqwest::Method::GET, &path).send().await.map_err(CatalogError::Http)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let resp = Self::check_status(resp, &url).await?;
        let keys: Vec<String> = resp.json().await.map_err(CatalogError::Decode)?;
        Ok(keys)
    }

    async fn kv_delete(&self, key: &str) -> Result<()> {
        let path = format!("/v1/kv/{KV_PREFIX}{key}");
        let url = self.url(&path);
        let resp = self.request(reqwest::Method::DELETE, &path).send().await.map_err(CatalogError::Http)?;
        Self::check_status(resp, &url).await?;
        Ok(())
    }
}
