//! Listener and dispatcher.
//!
//! # Responsibilities
//! - Bind the listening socket with address reuse
//! - Accept clients on a dedicated loop; never do protocol work there
//! - Track live connections for shutdown accounting
//! - Hand every accepted client to the worker pool
//!
//! # Design Decisions
//! - Each connection subscribes to the shutdown channel when it is
//!   dispatched, so queued and in-flight handlers both observe the signal
//!   and drop their sockets
//! - The live-clients registry is a concurrent map guarded by its own
//!   sharded locks; it is never touched under the cache mutex

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use uuid::Uuid;

use crate::cache::{CacheLimitsError, LruCache};
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pool::WorkerPool;
use crate::proxy::handler;

/// Error type for server startup and accept operations.
#[derive(Debug)]
pub enum ServerError {
    /// Failed to bind the listening socket.
    Bind(io::Error),
    /// Rejected cache limits.
    Cache(CacheLimitsError),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ServerError::Cache(e) => write!(f, "Invalid cache limits: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

/// The proxy engine: listening socket, dispatcher loop, worker pool and the
/// shared response cache.
pub struct ProxyServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    pool: WorkerPool,
    cache: Option<Arc<LruCache>>,
    clients: Arc<DashMap<Uuid, SocketAddr>>,
    connect_timeout: Duration,
}

impl ProxyServer {
    /// Bind the listening socket and assemble the engine from config.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, ServerError> {
        let cache = if config.cache.enabled {
            let cache = LruCache::new(config.cache.max_item_size, config.cache.max_total_size)
                .map_err(ServerError::Cache)?;
            Some(Arc::new(cache))
        } else {
            None
        };

        let addr: SocketAddr = config.listener.bind_address.parse().map_err(|e| {
            ServerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, format!("{e}")))
        })?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ServerError::Bind)?;
        socket.set_reuseaddr(true).map_err(ServerError::Bind)?;
        socket.bind(addr).map_err(ServerError::Bind)?;
        let listener = socket.listen(1024).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;

        let pool = WorkerPool::new(config.pool.workers);

        tracing::info!(
            address = %local_addr,
            workers = config.pool.workers,
            cache_enabled = config.cache.enabled,
            "proxy listener bound"
        );

        Ok(Self {
            listener,
            local_addr,
            pool,
            cache,
            clients: Arc::new(DashMap::new()),
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
        })
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the shared cache, `None` when caching is disabled.
    pub fn cache(&self) -> Option<Arc<LruCache>> {
        self.cache.clone()
    }

    /// Number of connections currently tracked.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Run the dispatcher until the shutdown signal fires, then stop
    /// accepting, let handlers observe the signal, and drain the pool.
    pub async fn run(self, shutdown: Arc<Shutdown>) -> Result<(), ServerError> {
        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("dispatcher stopping");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.dispatch(stream, peer, &shutdown),
                        Err(err) => tracing::error!(error = %err, "accept failed"),
                    }
                }
            }
        }

        // Stop accepting before draining the pool.
        drop(self.listener);
        tracing::info!(
            tracked_clients = self.clients.len(),
            "waiting for connection handlers to finish"
        );
        self.pool.shutdown().await;
        tracing::info!("proxy stopped");
        Ok(())
    }

    /// Register the client and schedule its handler on the pool.
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr, shutdown: &Shutdown) {
        let id = Uuid::new_v4();
        self.clients.insert(id, peer);
        metrics::record_connection_opened();
        tracing::debug!(
            connection = %id,
            peer = %peer,
            live = self.clients.len(),
            "connection accepted"
        );

        let cache = self.cache.clone();
        let clients = Arc::clone(&self.clients);
        let connect_timeout = self.connect_timeout;
        let mut shutdown_rx = shutdown.subscribe();
        let scheduled = self.pool.schedule(move || async move {
            let _guard = ClientGuard { id, clients };
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::debug!(connection = %id, "connection dropped by shutdown");
                }
                result = handler::handle_connection(stream, cache, connect_timeout) => {
                    if let Err(err) = result {
                        tracing::error!(connection = %id, error = %err, "connection failed");
                    }
                }
            }
        });
        if !scheduled {
            tracing::error!(connection = %id, "worker pool rejected connection");
            self.clients.remove(&id);
            metrics::record_connection_closed();
        }
    }
}

/// Removes a connection from the live-clients registry when the handler
/// finishes, on every exit path.
struct ClientGuard {
    id: Uuid,
    clients: Arc<DashMap<Uuid, SocketAddr>>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.clients.remove(&self.id);
        metrics::record_connection_closed();
    }
}
