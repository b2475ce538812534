//! One service instance as seen by the balancer: address, static weight,
//! in-flight request count, and the failure-cooldown skip counter.
//!
//! Grounded on `original_source/net/balancer/backend.go`; the skip-counter
//! quirk (decrement, then clamp to zero the first time it goes negative
//! rather than drifting unboundedly) is preserved literally.

use std::sync::atomic::{AtomicI32, Ordering};

const SKIP_WINDOW: i32 = 7;

/// One backend instance: a resolved address plus the counters the balancer
/// mutates on every pick and every completion.
#[derive(Debug)]
pub struct Backend {
    weight: i32,
    host_address: String,
    address: String,
    skip_counter: AtomicI32,
    request_counter: AtomicI32,
}

impl Backend {
    pub fn new(host_address: impl Into<String>, address: impl Into<String>, weight: i32) -> Self {
        Self {
            weight,
            host_address: host_address.into(),
            address: address.into(),
            skip_counter: AtomicI32::new(0),
            request_counter: AtomicI32::new(0),
        }
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn host_address(&self) -> &str {
        &self.host_address
    }

    /// Opens a 7-pick skip window, e.g. after a request to this backend fails.
    pub fn skip(&self) {
        self.skip_counter.store(SKIP_WINDOW, Ordering::SeqCst);
    }

    /// Decrements the skip counter and reports whether this pick still
    /// falls inside the skip window.
    ///
    /// The counter is clamped to zero the first time a decrement takes it
    /// non-positive, so repeated calls after the window closes don't drift
    /// it further negative — it simply reads zero (not-skipping) forever
    /// until the next `skip()`.
    pub fn do_skip(&self) -> bool {
        let counter = self.skip_counter.fetch_sub(1, Ordering::SeqCst) - 1;
        if counter <= 0 {
            let _ = self.skip_counter.compare_exchange(counter, 0, Ordering::SeqCst, Ordering::SeqCst);
        }
        counter >= 0
    }

    pub fn concurrent_request_count(&self) -> i32 {
        self.request_counter.load(Ordering::SeqCst)
    }

    /// Adjusts the in-flight counter. Callers must pair `+1` with `-1`.
    pub fn inc_concurrent_request(&self, delta: i32) -> i32 {
        self.request_counter.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// A pick is eligible when there's no cap, or current load is strictly
    /// under the cap.
    pub fn is_eligible(&self, max_concurrent: i32) -> bool {
        max_concurrent <= 0 || self.concurrent_request_count() < max_concurrent
    }
}

pub fn gcd(a: i32, b: i32) -> i32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

pub fn gcd_of(backends: &[Backend]) -> i32 {
    let mut divisor = -1;
    for backend in backends {
        divisor = if divisor == -1 { backend.weight } else { gcd(divisor, backend.weight) };
    }
    divisor
}

pub fn max_weight_of(backends: &[Backend]) -> i32 {
    backends.iter().map(Backend::weight).fold(-1, i32::max)
}
