//! Metrics collection and exposition.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize metrics exporter and server.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record a response served straight from the cache.
pub fn record_cache_hit(bytes: usize) {
    counter!("proxy_cache_hits_total").increment(1);
    histogram!("proxy_cache_hit_bytes").record(bytes as f64);
}

/// Record a lookup that had to go to the origin.
pub fn record_cache_miss() {
    counter!("proxy_cache_misses_total").increment(1);
}

/// Record a captured response entering the cache.
pub fn record_cache_insert(bytes: usize) {
    counter!("proxy_cache_inserts_total").increment(1);
    histogram!("proxy_cache_insert_bytes").record(bytes as f64);
}

/// Record an accepted client connection.
pub fn record_connection_opened() {
    counter!("proxy_connections_total").increment(1);
    gauge!("proxy_live_connections").increment(1.0);
}

/// Record a client connection leaving the live set.
pub fn record_connection_closed() {
    gauge!("proxy_live_connections").decrement(1.0);
}

/// Record a finished relay and how many origin bytes it carried.
pub fn record_relay_complete(response_bytes: usize) {
    counter!("proxy_relays_total").increment(1);
    histogram!("proxy_response_bytes").record(response_bytes as f64);
}
