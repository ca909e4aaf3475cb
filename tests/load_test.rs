//! Concurrent load through the balancer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wlc_balancer::config::ProxyConfig;

mod common;

async fn slow_counting_backend(name: &'static str, hits: Arc<AtomicUsize>) -> std::net::SocketAddr {
    common::start_programmable_backend(move |path| {
        let hits = hits.clone();
        async move {
            if path != "/health" {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            (200, name.into())
        }
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_balance_and_settle() {
    let heavy_hits = Arc::new(AtomicUsize::new(0));
    let light_hits = Arc::new(AtomicUsize::new(0));
    let heavy = slow_counting_backend("heavy", heavy_hits.clone()).await;
    let light = slow_counting_backend("light", light_hits.clone()).await;

    let mut config = ProxyConfig::default();
    config.backends = vec![common::backend(heavy, 3), common::backend(light, 1)];
    config.health_check.enabled = false;

    let (proxy, shutdown) = common::start_balancer(config).await;
    let client = common::client();
    let url = format!("http://{}/work", proxy);

    let num_requests = 60;
    let start = Instant::now();
    let tasks: Vec<_> = (0..num_requests)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move { client.get(&url).send().await?.text().await })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    let elapsed = start.elapsed();
    println!("{} requests in {:?}", num_requests, elapsed);

    assert_eq!(ok, num_requests);
    let heavy_hits = heavy_hits.load(Ordering::SeqCst);
    let light_hits = light_hits.load(Ordering::SeqCst);
    assert_eq!(heavy_hits + light_hits, num_requests);
    assert!(heavy_hits > 0, "heavy backend should receive traffic");
    assert!(light_hits > 0, "light backend should receive traffic under overlap");

    // Once everything completed, connection counts are back to zero and
    // the pool-wide total matches what was sent. Response bodies are
    // released just after the last byte goes out.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let metrics = client
        .get(format!("http://{}/metrics", proxy))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains(&format!("Total Requests: {}\n", num_requests)));
    assert_eq!(metrics.matches("Active Connections: 0\n").count(), 2);
    assert!(metrics.contains(&format!("  Total Requests: {}\n", heavy_hits)));
    assert!(metrics.contains(&format!("  Total Requests: {}\n", light_hits)));

    shutdown.trigger();
}
