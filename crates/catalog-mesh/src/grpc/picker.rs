//! Picks one ready gRPC subconnection per call, preferring the balancer's
//! choice and falling back to plain round-robin across the ready set.
//!
//! Grounded on `original_source/net/grpc/balancer.go`'s `registryPicker`.
//! The original's `Done` callback is modeled here as an RAII guard
//! (`PickGuard`) rather than an explicit completion closure, since that's
//! the idiomatic way to pair an increment with its decrement in Rust.

use crate::balancer::{Balancer, BackendRef, Upstream};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Opaque handle a gRPC framework binding would use to identify a ready
/// subconnection. This crate treats it as an address string; a real
/// framework integration would substitute its own subconnection handle type.
pub type SubConn = String;

/// Decrements the picked backend's in-flight counter when dropped, the way
/// the original's `Done` callback does on call completion.
///
/// Holds the `Upstream` snapshot the backend was picked from (rather than
/// re-querying the balancer) so completion always credits the exact backend
/// that was picked, even if a refresh has since replaced the snapshot.
pub struct PickGuard {
    upstream: Arc<Upstream>,
    backend_ref: BackendRef,
}

impl Drop for PickGuard {
    fn drop(&mut self) {
        self.upstream.resolve(self.backend_ref).inc_concurrent_request(-1);
    }
}

/// Result of one `Picker::pick` call.
pub struct PickResult {
    pub sub_conn: SubConn,
    pub guard: Option<PickGuard>,
}

/// Built fresh by the gRPC framework whenever its ready-subconnection set
/// changes (mirrors `base.PickerBuilder.Build`).
pub enum Picker {
    /// No ready subconnections; every `pick` fails.
    Empty,
    /// Exactly one ready subconnection — always returned, no balancing.
    Single(SubConn),
    /// More than one; balancer-driven with round-robin fallback.
    Balanced {
        balancer: Arc<Balancer>,
        service_name: String,
        max_requests_by_backend: i32,
        by_address: HashMap<String, SubConn>,
        all: Vec<SubConn>,
        next: AtomicU32,
    },
}

impl Picker {
    pub fn empty() -> Self {
        Picker::Empty
    }

    pub fn single(sub_conn: SubConn) -> Self {
        Picker::Single(sub_conn)
    }

    pub fn balanced(
        balancer: Arc<Balancer>,
        service_name: impl Into<String>,
        max_requests_by_backend: i32,
        ready: Vec<(String, SubConn)>,
    ) -> Self {
        let all = ready.iter().map(|(_, sc)| sc.clone()).collect();
        let by_address = ready.into_iter().collect();
        Picker::Balanced {
            balancer,
            service_name: service_name.into(),
            max_requests_by_backend,
            by_address,
            all,
            next: AtomicU32::new(0),
        }
    }

    /// Returns `None` when there's no ready subconnection to pick (the
    /// caller should surface `NoSubConnAvailable`).
    pub fn pick(&self) -> Option<PickResult> {
        match self {
            Picker::Empty => None,
            Picker::Single(sc) => Some(PickResult { sub_conn: sc.clone(), guard: None }),
            Picker::Balanced { balancer, service_name, max_requests_by_backend, by_address, all, next } => {
                if let Ok((upstream, backend_ref)) = balancer.next(service_name, *max_requests_by_backend) {
                    let backend = upstream.resolve(backend_ref);
                    if let Some(sc) = by_address.get(backend.address()) {
                        backend.inc_concurrent_request(1);
                        return Some(PickResult {
                            sub_conn: sc.clone(),
                            guard: Some(PickGuard { upstream: Arc::clone(&upstream), backend_ref }),
                        });
                    }
                }
                if all.is_empty() {
                    return None;
                }
                let idx = next.fetch_add(1, Ordering::SeqCst).wrapping_add(1) % all.len() as u32;
                Some(PickResult { sub_conn: all[idx as usize].clone(), guard: None })
            }
        }
    }
}
