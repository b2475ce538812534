//! Parses a `registry://` gRPC dial target into host/port, and recognizes
//! bare-IP targets that don't need balancer-backed resolution.
//!
//! Grounded on `original_source/net/grpc/helpers.go`'s `parseTarget`/`formatIP`.

use crate::error::{Error, Result};
use std::net::IpAddr;
use tonic::transport::Uri;

pub const DEFAULT_PORT: u16 = 443;

/// Outcome of parsing a dial target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A bare IP (optionally with a port) — never re-resolved.
    Ip { host: String, port: u16 },
    /// A logical service name to watch through the balancer.
    Service { name: String, port: u16 },
}

impl Target {
    /// Builds a dialable `Uri` for one resolved backend address. `host` is
    /// the concrete address the balancer/resolver picked, not this target's
    /// own (possibly logical) name.
    pub fn dial_uri(&self, host: &str, port: u16) -> Result<Uri> {
        let authority = format_ip(host).unwrap_or_else(|| host.to_string());
        format!("http://{authority}:{port}")
            .parse::<Uri>()
            .map_err(|e| Error::Parse { path: "grpc_target.uri".to_string(), message: e.to_string() })
    }
}

/// Parses `target` (`host`, `host:port`, `scheme://host[:port]`) using
/// `default_port` when no port is present.
pub fn parse_target(target: &str, default_port: u16) -> Result<Target> {
    if target.is_empty() {
        return Err(Error::MissingAddress);
    }

    let (host, port) = split_host_port(target, default_port)?;

    if host.parse::<IpAddr>().is_ok() {
        Ok(Target::Ip { host, port })
    } else {
        Ok(Target::Service { name: host, port })
    }
}

fn split_host_port(target: &str, default_port: u16) -> Result<(String, u16)> {
    let without_scheme = target.split("://").last().unwrap_or(target);

    if !target.contains("://") {
        if let Some((host, port_str)) = without_scheme.rsplit_once(':') {
            let port = port_str.parse::<u16>().map_err(|_| Error::Parse {
                path: "grpc_target.port".to_string(),
                message: format!("invalid port {port_str}"),
            })?;
            return Ok((host.to_string(), port));
        }
        return Ok((without_scheme.to_string(), default_port));
    }

    // scheme://host[:port]
    if let Some((host, port_str)) = without_scheme.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }
    Ok((without_scheme.to_string(), default_port))
}

/// Brackets an IPv6 literal for use in a `host:port` string; IPv4 literals
/// pass through unchanged.
pub fn format_ip(addr: &str) -> Option<String> {
    let ip: IpAddr = addr.parse().ok()?;
    match ip {
        IpAddr::V4(_) => Some(addr.to_string()),
        IpAddr::V6(_) => Some(format!("[{addr}]")),
    }
}
