//! Core value types shared by the catalog client, discovery facade, and
//! balancer: `Service`, `Status`, `Filter`, and the tag-derived weight
//! formula.

use serde::{Deserialize, Serialize};

/// Health status of a service instance as reported by the catalog.
///
/// `Undefined` covers both "the catalog has no check registered" and the
/// fallback for any check status string this crate doesn't recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Undefined,
    Passing,
    Warning,
    Critical,
}

impl Status {
    /// Maps a catalog check status string (`"passing"`, `"warning"`,
    /// `"critical"`, anything else) onto `Status`.
    pub fn from_check_str(s: &str) -> Self {
        match s {
            "passing" => Status::Passing,
            "warning" => Status::Warning,
            "critical" => Status::Critical,
            _ => Status::Undefined,
        }
    }
}

/// A single registered service instance, as returned by discovery.
///
/// Immutable after construction; callers that need to mutate state (skip
/// counters, concurrency counts) do so on the `Backend` built from it, not
/// on the `Service` itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub datacenter: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub status: Status,
}

impl Service {
    /// Returns the full `host:port` address for this instance.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Looks up a tag's value by its `KEY` in `KEY=VALUE` tags. Returns
    /// `None` if the key isn't present or carries no `=` separator.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|t| {
            let (k, v) = t.split_once('=')?;
            (k == key).then_some(v)
        })
    }
}

/// Optional predicate applied at the discovery layer.
///
/// `datacenter == Some("all")` triggers multi-DC fan-out in
/// [`crate::discovery::Discovery::lookup`] rather than being evaluated as a
/// per-service predicate.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub id: Option<String>,
    pub status: Option<Status>,
    pub tags: Vec<String>,
    pub service: Option<String>,
    pub datacenter: Option<String>,
}

impl Filter {
    pub fn is_multi_datacenter(&self) -> bool {
        self.datacenter.as_deref() == Some("all")
    }

    /// Tests a service against this filter. Tag matching is bag (set)
    /// semantics — order never affects the result, and a service passes the
    /// tag clause if it carries at least one of the filter's tags.
    pub fn test(&self, service: &Service) -> bool {
        if let Some(id) = &self.id {
            if &service.id != id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if service.status != status {
                return false;
            }
        }
        if let Some(name) = &self.service {
            if &service.name != name {
                return false;
            }
        }
        if let Some(dc) = &self.datacenter {
            if dc != "all" && &service.datacenter != dc {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let service_tags: std::collections::HashSet<&str> =
                service.tags.iter().map(String::as_str).collect();
            if !self.tags.iter().any(|t| service_tags.contains(t.as_str())) {
                return false;
            }
        }
        true
    }
}

/// Derives a backend's routing weight from its tags.
///
/// `weight := (SERVICE_WEIGHT or 1) * 100; if CPU_USAGE > 0 then weight :=
/// weight / ceil(CPU_USAGE/4)`, clamped to a minimum of 1.
pub fn weight_from_tags(tags: &[String]) -> i32 {
    let service_weight = tags
        .iter()
        .find_map(|t| t.strip_prefix("SERVICE_WEIGHT=").and_then(|v| v.parse::<i32>().ok()))
        .unwrap_or(1);

    let mut weight = service_weight * 100;

    if let Some(cpu_usage) = tags
        .iter()
        .find_map(|t| t.strip_prefix("CPU_USAGE=").and_then(|v| v.parse::<f64>().ok()))
    {
        if cpu_usage > 0.0 {
            let divisor = (cpu_usage / 4.0).ceil() as i32;
            if divisor > 0 {
                weight /= divisor;
            }
        }
    }

    weight.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_parses_from_tags() {
        let tags = vec!["SERVICE_WEIGHT=3".to_string(), "CPU_USAGE=8".to_string()];
        assert_eq!(weight_from_tags(&tags), 150);
    }

    #[test]
    fn weight_defaults_to_one_hundred() {
        assert_eq!(weight_from_tags(&[]), 100);
    }

    #[test]
    fn weight_never_drops_below_one() {
        let tags = vec!["SERVICE_WEIGHT=1".to_string(), "CPU_USAGE=1000".to_string()];
        assert_eq!(weight_from_tags(&tags), 1);
    }

    #[test]
    fn filter_tag_match_is_order_independent() {
        let svc = Service {
            id: "svc-1".into(),
            name: "svc".into(),
            datacenter: "dc1".into(),
            address: "10.0.0.1".into(),
            port: 8080,
            tags: vec!["b=2".into(), "a=1".into()],
            status: Status::Passing,
        };
        let f1 = Filter { tags: vec!["a=1".into(), "b=2".into()], ..Default::default() };
        let f2 = Filter { tags: vec!["b=2".into(), "a=1".into()], ..Default::default() };
        assert!(f1.test(&svc));
        assert!(f2.test(&svc));
    }

    #[test]
    fn tag_value_looks_up_key() {
        let svc = Service {
            id: "svc-1".into(),
            name: "svc".into(),
            datacenter: "dc1".into(),
            address: "10.0.0.1".into(),
            port: 8080,
            tags: vec!["DC=dc1".into(), "SERVICE_WEIGHT=3".into()],
            status: Status::Passing,
        };
        assert_eq!(svc.tag_value("DC"), Some("dc1"));
        assert_eq!(svc.tag_value("MISSING"), None);
    }
}
