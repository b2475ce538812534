//! Logging setup for this crate's own binaries and for embedders that want
//! its structured format.

mod logger;

pub use logger::configure_logger;
