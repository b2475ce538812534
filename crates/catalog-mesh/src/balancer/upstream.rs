//! One service's routing table: its backend set plus the cursor and smooth
//! weighted round-robin state shared across `Next` calls.
//!
//! Grounded on `original_source/net/balancer/upstream.go`.

use super::backend::Backend;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Backends for one service, plus the state `next_backend`/`next_weight_backend`
/// mutate on every pick.
///
/// The priority backend (generally the local instance of the service, if
/// any) is an index into `backends`, not a separate slot — it stays a full
/// member of the group so `gcd`/`max_weight` are computed over the whole set
/// and it remains reachable as an ordinary round-robin candidate once it's
/// no longer preferred.
pub struct Upstream {
    index: AtomicU32,
    current_weight: AtomicI32,
    max_weight: i32,
    gcd: i32,
    priority_index: Option<usize>,
    backends: Vec<Backend>,
}

impl Upstream {
    pub fn new(backends: Vec<Backend>, priority_index: Option<usize>, gcd: i32, max_weight: i32) -> Self {
        Self {
            index: AtomicU32::new(0),
            current_weight: AtomicI32::new(max_weight),
            max_weight,
            gcd,
            priority_index,
            backends,
        }
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn priority_backend(&self) -> Option<&Backend> {
        self.priority_index.map(|i| &self.backends[i])
    }

    /// Count of backends this upstream routes to.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Plain round-robin pick: cursor increments modulo backend count,
    /// skipping backends over their concurrency cap.
    pub fn next_backend(&self, max_concurrent: i32) -> Option<&Backend> {
        if let Some(priority) = self.priority_backend() {
            if priority.is_eligible(max_concurrent) {
                return Some(priority);
            }
        }

        let count = self.backends.len() as u32;
        if count == 0 {
            return None;
        }

        for _ in 0..count {
            let index = self.index.fetch_add(1, Ordering::SeqCst).wrapping_add(1) % count;
            let backend = &self.backends[index as usize];
            if backend.is_eligible(max_concurrent) {
                return Some(backend);
            }
        }
        None
    }

    /// Nginx-style smooth weighted round-robin pick.
    pub fn next_weight_backend(&self, max_concurrent: i32) -> Option<&Backend> {
        if let Some(priority) = self.priority_backend() {
            if priority.is_eligible(max_concurrent) {
                return Some(priority);
            }
        }

        let count = self.backends.len() as u32;
        if count == 0 {
            return None;
        }

        for _ in 0..count {
            let raw_index = self.index.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
            let index = raw_index % count;
            let backend = &self.backends[index as usize];

            if !backend.is_eligible(max_concurrent) {
                continue;
            }

            let current_weight = if index == 0 {
                let updated = self.current_weight.fetch_sub(self.gcd, Ordering::SeqCst) - self.gcd;
                if updated <= 0 {
                    self.current_weight.store(self.max_weight, Ordering::SeqCst);
                    if self.max_weight == 0 {
                        return Some(backend);
                    }
                    self.max_weight
                } else {
                    updated
                }
            } else {
                self.current_weight.load(Ordering::SeqCst)
            };

            if backend.weight() >= current_weight {
                if backend.do_skip() {
                    continue;
                }
                return Some(backend);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream_of(weights: &[i32]) -> Upstream {
        let backends: Vec<Backend> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| Backend::new(format!("h{i}"), format!("h{i}:80"), *w))
            .collect();
        let gcd = super::super::backend::gcd_of(&backends);
        let max_weight = super::super::backend::max_weight_of(&backends);
        Upstream::new(backends, None, gcd, max_weight)
    }

    #[test]
    fn round_robin_cycles_through_all_backends() {
        let ups = upstream_of(&[100, 100, 100]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..6 {
            let b = ups.next_backend(0).unwrap();
            seen.insert(b.address().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn round_robin_skips_backends_at_capacity() {
        let ups = upstream_of(&[100, 100]);
        ups.backends()[0].inc_concurrent_request(5);
        for _ in 0..4 {
            let picked = ups.next_backend(5).unwrap();
            assert_eq!(picked.address(), "h1:80");
        }
    }

    #[test]
    fn weighted_distribution_favors_higher_weight() {
        let ups = upstream_of(&[300, 100]);
        let mut counts = std::collections::HashMap::new();
        for _ in 0..400 {
            let b = ups.next_weight_backend(0).unwrap();
            *counts.entry(b.address().to_string()).or_insert(0) += 1;
        }
        assert!(counts["h0:80"] > counts["h1:80"]);
    }

    #[test]
    fn priority_backend_wins_while_under_capacity() {
        let backends = vec![Backend::new("h1", "h1:80", 100), Backend::new("local", "local:80", 100)];
        let ups = Upstream::new(backends, Some(1), 100, 100);
        let picked = ups.next_backend(0).unwrap();
        assert_eq!(picked.address(), "local:80");
    }

    #[test]
    fn priority_backend_stays_in_the_group_and_counts_toward_len() {
        let backends = vec![Backend::new("h1", "h1:80", 100), Backend::new("local", "local:80", 100)];
        let ups = Upstream::new(backends, Some(1), 100, 100);
        assert_eq!(ups.len(), 2);
        assert_eq!(ups.backends().len(), 2);
    }

    #[test]
    fn returns_none_when_no_backend_qualifies() {
        let ups = upstream_of(&[100]);
        ups.backends()[0].inc_concurrent_request(1);
        assert!(ups.next_backend(1).is_none());
    }
}
