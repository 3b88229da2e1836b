//! End-to-end tests: real sockets, a mock origin, one proxy per test.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use caching_proxy::cache::LruCache;
use caching_proxy::config::ProxyConfig;
use caching_proxy::lifecycle::Shutdown;
use caching_proxy::proxy::ProxyServer;

mod common;

struct RunningProxy {
    addr: SocketAddr,
    cache: Option<Arc<LruCache>>,
    shutdown: Arc<Shutdown>,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningProxy {
    async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap();
    }
}

async fn start_proxy(mut config: ProxyConfig) -> RunningProxy {
    config.listener.bind_address = "127.0.0.1:0".into();
    let server = ProxyServer::bind(&config).await.unwrap();
    let addr = server.local_addr();
    let cache = server.cache();
    let shutdown = Arc::new(Shutdown::new());
    let run_shutdown = Arc::clone(&shutdown);
    let handle = tokio::spawn(async move {
        server.run(run_shutdown).await.unwrap();
    });
    RunningProxy {
        addr,
        cache,
        shutdown,
        handle,
    }
}

fn small_pool_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.pool.workers = 4;
    config
}

#[tokio::test]
async fn test_cache_miss_then_hit() {
    let (origin, origin_hits) = common::start_mock_origin("hello from origin".into()).await;
    let proxy = start_proxy(small_pool_config()).await;
    let cache = proxy.cache.clone().expect("cache enabled by default");

    let url = format!("http://{origin}/a.html");
    let first = common::proxy_get(proxy.addr, &url).await;
    assert!(first.ends_with(b"hello from origin"));
    assert!(first.starts_with(b"HTTP/1.1 200 OK"));
    assert_eq!(origin_hits.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.success_hits, 0);
    assert_eq!(stats.total_hits, 1);
    assert_eq!(stats.item_count, 1);
    assert_eq!(stats.total_bytes, first.len());

    // a second client gets the captured bytes without a second origin fetch
    let second = common::proxy_get(proxy.addr, &url).await;
    assert_eq!(second, first);
    assert_eq!(origin_hits.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.success_hits, 1);
    assert_eq!(stats.total_hits, 2);
    assert_eq!(stats.item_count, 1);

    proxy.stop().await;
}

#[tokio::test]
async fn test_dynamic_path_bypasses_cache() {
    let (origin, origin_hits) = common::start_mock_origin("generated".into()).await;
    let proxy = start_proxy(small_pool_config()).await;
    let cache = proxy.cache.clone().unwrap();

    let url = format!("http://{origin}/x.php?q=1");
    let first = common::proxy_get(proxy.addr, &url).await;
    let second = common::proxy_get(proxy.addr, &url).await;
    assert!(first.ends_with(b"generated"));
    assert_eq!(second, first);
    // both requests reached the origin and nothing was stored
    assert_eq!(origin_hits.load(Ordering::SeqCst), 2);
    let stats = cache.stats();
    assert_eq!(stats.item_count, 0);
    assert_eq!(stats.success_hits, 0);

    proxy.stop().await;
}

#[tokio::test]
async fn test_oversized_response_relayed_but_not_cached() {
    let body = "x".repeat(2000);
    let (origin, _) = common::start_mock_origin(body.clone()).await;
    let mut config = small_pool_config();
    config.cache.max_item_size = 1000;
    let proxy = start_proxy(config).await;
    let cache = proxy.cache.clone().unwrap();

    let url = format!("http://{origin}/big.html");
    let response = common::proxy_get(proxy.addr, &url).await;
    assert!(response.ends_with(body.as_bytes()));

    let stats = cache.stats();
    assert_eq!(stats.item_count, 0);
    assert_eq!(stats.total_bytes, 0);

    proxy.stop().await;
}

#[tokio::test]
async fn test_cache_disabled_always_fetches() {
    let (origin, origin_hits) = common::start_mock_origin("plain".into()).await;
    let mut config = small_pool_config();
    config.cache.enabled = false;
    let proxy = start_proxy(config).await;
    assert!(proxy.cache.is_none());

    let url = format!("http://{origin}/a.html");
    common::proxy_get(proxy.addr, &url).await;
    common::proxy_get(proxy.addr, &url).await;
    assert_eq!(origin_hits.load(Ordering::SeqCst), 2);

    proxy.stop().await;
}

#[tokio::test]
async fn test_non_get_closed_without_response() {
    let (origin, origin_hits) = common::start_mock_origin("unused".into()).await;
    let proxy = start_proxy(small_pool_config()).await;

    let response =
        common::proxy_request(proxy.addr, &format!("POST http://{origin}/form HTTP/1.1")).await;
    assert!(response.is_empty());
    assert_eq!(origin_hits.load(Ordering::SeqCst), 0);

    proxy.stop().await;
}

#[tokio::test]
async fn test_connect_closed_without_response() {
    let (origin, origin_hits) = common::start_mock_origin("unused".into()).await;
    let proxy = start_proxy(small_pool_config()).await;

    let response =
        common::proxy_request(proxy.addr, &format!("CONNECT {origin} HTTP/1.1")).await;
    assert!(response.is_empty());
    assert_eq!(origin_hits.load(Ordering::SeqCst), 0);

    proxy.stop().await;
}

#[tokio::test]
async fn test_malformed_request_closed() {
    let proxy = start_proxy(small_pool_config()).await;

    let response = common::proxy_request(proxy.addr, "complete nonsense").await;
    assert!(response.is_empty());

    proxy.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_same_url() {
    let (origin, origin_hits) = common::start_mock_origin("shared body".into()).await;
    let proxy = start_proxy(small_pool_config()).await;

    let url = format!("http://{origin}/shared.html");
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let url = url.clone();
        let addr = proxy.addr;
        tasks.push(tokio::spawn(
            async move { common::proxy_get(addr, &url).await },
        ));
    }
    for task in tasks {
        let response = task.await.unwrap();
        assert!(response.ends_with(b"shared body"));
    }
    // concurrent misses may race to the origin, but every client is served
    assert!(origin_hits.load(Ordering::SeqCst) >= 1);

    proxy.stop().await;
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let (origin, _) = common::start_mock_origin("bye".into()).await;
    let proxy = start_proxy(small_pool_config()).await;

    let url = format!("http://{origin}/a.html");
    common::proxy_get(proxy.addr, &url).await;

    let addr = proxy.addr;
    proxy.stop().await;
    // the listener is gone after shutdown completes
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
