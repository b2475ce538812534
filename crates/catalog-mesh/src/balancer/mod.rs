//! Process-wide dynamic load balancer: polls [`crate::discovery::Discovery`]
//! on an interval, groups live backends by service name, and serves picks
//! under round-robin or smooth-weighted strategies.
//!
//! Grounded on `original_source/net/balancer/balancer.go`. The original
//! swaps its routing table through `unsafe.Pointer` + `sync/atomic`; this
//! crate uses [`arc_swap::ArcSwap`] for the same lock-free snapshot swap,
//! which is the idiomatic Rust substitute for that pattern.

pub mod backend;
pub mod upstream;

pub use upstream::Upstream;

use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::model::{weight_from_tags, Filter, Status};
use arc_swap::ArcSwap;
use backend::{gcd_of, max_weight_of, Backend};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Picking strategy for [`Balancer::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
    Weighted,
}

/// Dynamic, self-refreshing routing table over one [`Discovery`].
pub struct Balancer {
    strategy: Strategy,
    discovery: Arc<Discovery>,
    local_addresses: Vec<String>,
    upstreams: ArcSwap<HashMap<String, Arc<Upstream>>>,
    closed: Arc<AtomicBool>,
    refresh_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Balancer {
    /// `local_addresses` identifies this process's own network interfaces,
    /// used to prefer a same-host backend. Unlike the original, which
    /// enumerates interfaces itself, callers here supply them explicitly —
    /// pass an empty slice if locality-based priority routing isn't needed.
    pub fn new(strategy: Strategy, discovery: Arc<Discovery>, local_addresses: Vec<String>) -> Self {
        Self {
            strategy,
            discovery,
            local_addresses,
            upstreams: ArcSwap::from_pointee(HashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
            refresh_task: std::sync::Mutex::new(None),
        }
    }

    /// Performs an initial lookup, then spawns a task that repeats it every
    /// `interval` until [`Self::close`] is called.
    pub async fn run(self: &Arc<Self>, interval: std::time::Duration) -> Result<()> {
        self.refresh().await?;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it, we already looked up
            loop {
                ticker.tick().await;
                if this.closed.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(err) = this.refresh().await {
                    warn!("balancer refresh failed: {err}");
                }
            }
        });
        *self.refresh_task.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Synchronous re-lookup and full snapshot replacement.
    pub async fn refresh(&self) -> Result<()> {
        let services = self.discovery.lookup(&Filter::default()).await?;

        // HTTP-fronted balancers may further restrict this to Passing-only
        // at the transport layer; the balancer itself accepts both.
        let mut grouped: HashMap<String, Vec<Backend>> = HashMap::new();
        for service in services {
            if !matches!(service.status, Status::Passing | Status::Undefined) {
                continue;
            }
            let weight = weight_from_tags(&service.tags);
            grouped.entry(service.name.clone()).or_default().push(Backend::new(
                service.address.clone(),
                service.host_port(),
                weight,
            ));
        }

        let mut upstreams = HashMap::with_capacity(grouped.len());
        for (name, backends) in grouped {
            let priority_index = backends
                .iter()
                .position(|b| self.local_addresses.iter().any(|addr| addr == b.host_address()));

            // gcd/max_weight are computed over the full group, including the
            // priority backend, so it isn't removed before this point.
            let gcd = gcd_of(&backends);
            let max_weight = max_weight_of(&backends);
            debug!("balancer: {name} has {} backends (priority={})", backends.len(), priority_index.is_some());
            upstreams.insert(name, Arc::new(Upstream::new(backends, priority_index, gcd, max_weight)));
        }

        self.upstreams.store(Arc::new(upstreams));
        Ok(())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.refresh_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn count_of_backends(&self, service: &str) -> usize {
        self.upstreams.load().get(service).map_or(0, |u| u.len())
    }

    /// Snapshot copy of `service`'s backends, including the priority
    /// backend if present (it's a normal member of the group). Used by the
    /// gRPC resolver to build address lists without holding a reference into
    /// the balancer's internal snapshot.
    pub fn backends(&self, service: &str) -> Vec<BackendInfo> {
        let snapshot = self.upstreams.load();
        let Some(upstream) = snapshot.get(service) else {
            return Vec::new();
        };
        upstream
            .backends()
            .iter()
            .map(|b| BackendInfo { address: b.address().to_string(), host_address: b.host_address().to_string() })
            .collect()
    }

    fn get_upstream(&self, service: &str) -> Result<Arc<Upstream>> {
        let snapshot = self.upstreams.load();
        snapshot
            .get(service)
            .cloned()
            .ok_or_else(|| Error::NotFound { service: service.to_string() })
    }

    /// Picks one backend for `service` under the configured strategy.
    ///
    /// Returns the pair `(upstream, backend_ref)`; resolve the actual
    /// backend via `upstream.resolve(backend_ref)`. This indirection exists
    /// because `Backend` borrows from the `Upstream` snapshot, and callers
    /// need the snapshot kept alive for the backend reference to remain
    /// valid (e.g. across an `.await` while the request is in flight).
    pub fn next(&self, service: &str, max_concurrent: i32) -> Result<(Arc<Upstream>, BackendRef)> {
        let upstream = self.get_upstream(service)?;
        let picked = match self.strategy {
            Strategy::RoundRobin => upstream.next_backend(max_concurrent),
            Strategy::Weighted => upstream.next_weight_backend(max_concurrent),
        };
        match picked {
            Some(backend) => {
                let idx = upstream
                    .backends()
                    .iter()
                    .position(|b| std::ptr::eq(b, backend))
                    .expect("picked backend must belong to this upstream");
                Ok((upstream, BackendRef(idx)))
            }
            None => Err(Error::NoEligibleBackend { service: service.to_string() }),
        }
    }

}

/// Identifies which backend within an [`Upstream`] snapshot was picked, by
/// position in `upstream.backends()` (the priority backend, if any, is just
/// an ordinary member of that slice).
#[derive(Debug, Clone, Copy)]
pub struct BackendRef(usize);

/// Owned snapshot of one backend's addressing, detached from the balancer's
/// internal `Upstream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub address: String,
    pub host_address: String,
}

impl Upstream {
    pub fn resolve<'a>(&'a self, backend_ref: BackendRef) -> &'a Backend {
        &self.backends()[backend_ref.0]
    }
}
