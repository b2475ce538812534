//! Watches one service through a [`Balancer`] and republishes its address
//! list on a `tokio::sync::watch` channel, the Rust-channel substitute for
//! the original's direct `resolver.ClientConn.NewAddress` callback.
//!
//! Grounded on `original_source/net/grpc/grpc_resolver.go`.

use crate::balancer::{Balancer, BackendInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// One resolved address, with the service-port override already applied if
/// configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub addr: String,
    pub backend_address: String,
}

/// Per-connection resolver: ticks on an interval, reads the balancer's
/// current backend set for `service_name`, and pushes the resolved address
/// list to anyone holding a receiver.
pub struct Resolver {
    balancer: Arc<Balancer>,
    service_name: String,
    service_port: Option<u16>,
    tx: watch::Sender<Vec<ResolvedAddress>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Resolver {
    pub fn new(balancer: Arc<Balancer>, service_name: impl Into<String>, service_port: Option<u16>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(Vec::new());
        let resolver = Arc::new(Self {
            balancer,
            service_name: service_name.into(),
            service_port,
            tx,
            task: std::sync::Mutex::new(None),
        });
        resolver.refresh_connection();
        resolver
    }

    pub fn watch(&self) -> watch::Receiver<Vec<ResolvedAddress>> {
        self.tx.subscribe()
    }

    /// Triggers an immediate refresh, as `ResolveNow` does in the original.
    pub fn resolve_now(self: &Arc<Self>) {
        self.refresh_connection();
    }

    fn refresh_connection(&self) {
        let backends: Vec<BackendInfo> = self.balancer.backends(&self.service_name);
        let addresses = backends
            .into_iter()
            .map(|b| {
                let addr = match self.service_port {
                    Some(port) => format!("{}:{port}", b.host_address),
                    None => b.address.clone(),
                };
                ResolvedAddress { addr, backend_address: b.address }
            })
            .collect();
        let _ = self.tx.send(addresses);
    }

    /// Starts the ticking watcher. The returned handle is dropped by
    /// `close`; callers don't need to hold it themselves.
    pub fn watcher(self: &Arc<Self>, interval: Duration) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.refresh_connection();
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    pub fn close(&self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
