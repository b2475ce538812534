//! Aggregates catalog queries into a single `Vec<Service>`, applying a
//! [`Filter`] and multi-datacenter fan-out on top of a bare [`Catalog`].
//!
//! Grounded on `original_source/discovery.go`'s `Lookup`: merge health check
//! status by service ID, skip the catalog's own `consul` service entry, then
//! test each candidate against the filter.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::model::{Filter, Service, Status};
use std::collections::HashMap;
use std::sync::Arc;

/// Name the underlying catalog agent registers itself under; never a
/// real backend, so it's dropped before filtering.
const CATALOG_SELF_SERVICE: &str = "consul";

/// Read-side facade over a [`Catalog`]: merges service listings with health
/// check status and applies [`Filter`] predicates, including the
/// `datacenter == "all"` fan-out.
pub struct Discovery {
    catalog: Arc<dyn Catalog>,
    datacenter: String,
}

impl Discovery {
    pub fn new(catalog: Arc<dyn Catalog>, datacenter: impl Into<String>) -> Self {
        Self { catalog, datacenter: datacenter.into() }
    }

    /// Returns every service matching `filter`.
    ///
    /// `filter.datacenter == "all"` runs [`Self::lookup_one`] against every
    /// datacenter reported by the catalog and concatenates the results,
    /// failing fast on the first DC that errors.
    pub async fn lookup(&self, filter: &Filter) -> Result<Vec<Service>> {
        if filter.is_multi_datacenter() {
            let dcs = self.catalog.list_datacenters().await?;
            let per_dc = futures_util::future::try_join_all(dcs.iter().map(|dc| self.lookup_one(dc, filter))).await?;
            Ok(per_dc.into_iter().flatten().collect())
        } else {
            let dc = filter.datacenter.clone().unwrap_or_else(|| self.datacenter.clone());
            self.lookup_one(&dc, filter).await
        }
    }

    async fn lookup_one(&self, dc: &str, filter: &Filter) -> Result<Vec<Service>> {
        let services = self.catalog.list_services(dc).await?;

        let mut by_id: HashMap<String, Status> = HashMap::new();
        for svc in &services {
            if svc.name == CATALOG_SELF_SERVICE {
                continue;
            }
            if let Ok(checks) = self.catalog.list_health_checks(&svc.name, dc).await {
                for check in checks {
                    by_id.insert(check.service_id, check.status());
                }
            }
        }

        let result = services
            .into_iter()
            .filter(|svc| svc.name != CATALOG_SELF_SERVICE)
            .map(|mut svc| {
                if let Some(status) = by_id.get(&svc.id) {
                    svc.status = *status;
                }
                svc
            })
            .filter(|svc| filter.test(svc))
            .collect();

        Ok(result)
    }
}
