//! Integration tests for the balancer, built against a `FakeCatalog` so no
//! network I/O is involved.

use catalog_mesh::balancer::{Balancer, Strategy};
use catalog_mesh::catalog::fake::FakeCatalog;
use catalog_mesh::discovery::Discovery;
use std::sync::Arc;

async fn register(fake: &FakeCatalog, id: &str, address: &str, weight: i32) {
    fake.register(id, "web", address, 8080, &[format!("DC=dc1"), format!("SERVICE_WEIGHT={weight}")], None)
        .await
        .unwrap();
}

#[tokio::test]
async fn round_robin_picks_every_backend_before_repeating() {
    let fake = Arc::new(FakeCatalog::new());
    register(&fake, "svc-1", "10.0.0.1", 1).await;
    register(&fake, "svc-2", "10.0.0.2", 1).await;
    register(&fake, "svc-3", "10.0.0.3", 1).await;

    let discovery = Arc::new(Discovery::new(fake, "dc1"));
    let balancer = Arc::new(Balancer::new(Strategy::RoundRobin, discovery, vec![]));
    balancer.refresh().await.unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..3 {
        let (upstream, backend_ref) = balancer.next("web", 0).unwrap();
        seen.insert(upstream.resolve(backend_ref).address().to_string());
    }
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn weighted_strategy_favors_higher_weight() {
    let fake = Arc::new(FakeCatalog::new());
    register(&fake, "svc-heavy", "10.0.0.1", 9).await;
    register(&fake, "svc-light", "10.0.0.2", 1).await;

    let discovery = Arc::new(Discovery::new(fake, "dc1"));
    let balancer = Arc::new(Balancer::new(Strategy::Weighted, discovery, vec![]));
    balancer.refresh().await.unwrap();

    let mut counts = std::collections::HashMap::new();
    for _ in 0..500 {
        let (upstream, backend_ref) = balancer.next("web", 0).unwrap();
        *counts.entry(upstream.resolve(backend_ref).address().to_string()).or_insert(0) += 1;
    }
    assert!(counts["10.0.0.1:8080"] > counts["10.0.0.2:8080"]);
}

#[tokio::test]
async fn local_address_is_preferred_as_priority_backend() {
    let fake = Arc::new(FakeCatalog::new());
    register(&fake, "svc-remote", "10.0.0.1", 1).await;
    register(&fake, "svc-local", "10.0.0.9", 1).await;

    let discovery = Arc::new(Discovery::new(fake, "dc1"));
    let balancer = Arc::new(Balancer::new(Strategy::RoundRobin, discovery, vec!["10.0.0.9".to_string()]));
    balancer.refresh().await.unwrap();

    for _ in 0..5 {
        let (upstream, backend_ref) = balancer.next("web", 0).unwrap();
        assert_eq!(upstream.resolve(backend_ref).host_address(), "10.0.0.9");
    }
}

#[tokio::test]
async fn priority_backend_still_counts_toward_gcd_and_max_weight() {
    // Weights [150, 700] with the 150-weight backend as priority: gcd/max
    // must be computed over the full pair (gcd(150,700)=50, max=700), not
    // over the remaining single backend (which would trivially give 700/700).
    let fake = Arc::new(FakeCatalog::new());
    register(&fake, "svc-priority", "10.0.0.9", 150).await;
    register(&fake, "svc-other", "10.0.0.1", 700).await;

    let discovery = Arc::new(Discovery::new(fake, "dc1"));
    let balancer = Arc::new(Balancer::new(Strategy::RoundRobin, discovery, vec!["10.0.0.9".to_string()]));
    balancer.refresh().await.unwrap();

    assert_eq!(balancer.count_of_backends("web"), 2);
}

#[tokio::test]
async fn failing_backend_is_skipped_for_seven_picks() {
    let fake = Arc::new(FakeCatalog::new());
    register(&fake, "svc-1", "10.0.0.1", 1).await;
    register(&fake, "svc-2", "10.0.0.2", 1).await;

    let discovery = Arc::new(Discovery::new(fake, "dc1"));
    let balancer = Arc::new(Balancer::new(Strategy::RoundRobin, discovery, vec![]));
    balancer.refresh().await.unwrap();

    let (upstream, backend_ref) = balancer.next("web", 0).unwrap();
    upstream.resolve(backend_ref).skip();

    // Round-robin itself doesn't consult the skip counter (only the
    // weighted strategy does), so this only confirms the skip state is
    // readable through the same upstream snapshot used for picking.
    assert!(upstream.resolve(backend_ref).do_skip());
}

#[tokio::test]
async fn refresh_drops_backends_no_longer_registered() {
    let fake = Arc::new(FakeCatalog::new());
    register(&fake, "svc-1", "10.0.0.1", 1).await;

    let discovery = Arc::new(Discovery::new(fake.clone(), "dc1"));
    let balancer = Arc::new(Balancer::new(Strategy::RoundRobin, discovery, vec![]));
    balancer.refresh().await.unwrap();
    assert_eq!(balancer.count_of_backends("web"), 1);

    fake.deregister("svc-1").await.unwrap();
    balancer.refresh().await.unwrap();
    assert_eq!(balancer.count_of_backends("web"), 0);
}
