//! gRPC integration points: target parsing, a balancer-backed resolver, and
//! a picker that prefers the balancer's choice with round-robin fallback.
//!
//! These types model the shapes a gRPC client library's resolver/picker
//! plugin points expect; wiring them into a specific library (e.g. tonic's
//! `tower::discover::Discover` / load-balancing layer) is left to the
//! embedder, since that glue is framework-specific and out of this crate's
//! scope.

pub mod picker;
pub mod resolver;
pub mod target;

pub use picker::{PickGuard, PickResult, Picker, SubConn};
pub use resolver::{ResolvedAddress, Resolver, DEFAULT_REFRESH_INTERVAL};
pub use target::{format_ip, parse_target, Target, DEFAULT_PORT};
