//! Crate-wide error type.
//!
//! One enum covers every error kind the design calls out: catalog transport
//! failures, balancer lookup misses, config-bind parse failures, and gRPC
//! target parsing. Request-path errors are returned to the caller after
//! retries are exhausted; refresher errors are logged by the refresher and
//! never reach this type's callers (see `balancer::Balancer::refresh` and
//! `config::refresh`).

use thiserror::Error;

/// Errors produced anywhere in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// No upstream exists for the requested service name.
    #[error("no upstream for service {service}")]
    NotFound { service: String },

    /// An upstream exists but every backend is skipping or at capacity.
    #[error("no eligible backend for service {service}")]
    NoEligibleBackend { service: String },

    /// A call to the external catalog failed. The inner error is preserved.
    #[error("catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    /// A default/env/flag/KV value could not be parsed into its field type.
    #[error("failed to parse field {path}: {message}")]
    Parse { path: String, message: String },

    /// The gRPC target string was empty.
    #[error("missing address in gRPC target")]
    MissingAddress,

    /// A bindable field was in a state that cannot be assigned (e.g. no setter).
    #[error("invalid value for field {path}: {message}")]
    InvalidValue { path: String, message: String },
}

/// Transport-level failure talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("could not parse catalog response: {0}")]
    Decode(reqwest::Error),

    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
