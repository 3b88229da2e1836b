//! Per-connection request handling.
//!
//! # State Machine
//! ```text
//! ┌──────────────┐    ┌───────┐    ┌─────────────────────────┐
//! │ Read-request │───▶│ Parse │───▶│ Reject non-GET (close)  │
//! └──────────────┘    └───┬───┘    └─────────────────────────┘
//!                         │        ┌─────────────────────────┐
//!                         ├───────▶│ Tunnel (CONNECT stub)   │
//!                         │        └─────────────────────────┘
//!                         │        ┌─────────────────────────┐
//!                         ├───────▶│ Cache-hit → write, close│
//!                         │        └─────────────────────────┘
//!                         ▼
//!                    ┌─────────┐   EOF on either side
//!                    │  Relay  │──────────────▶ Maybe-cache → Close
//!                    └─────────┘
//! ```
//!
//! # Design Decisions
//! - Only the raw request line is forwarded to the origin; everything after
//!   it is relayed byte-for-byte in both directions
//! - Origin bytes accumulate in a growable buffer so a cacheable response
//!   can be inserted after the relay ends
//! - Malformed lines and unsupported verbs close the connection without a
//!   response
//! - Sockets close through ownership; every exit path drops both halves

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::cache::LruCache;
use crate::observability::metrics;
use crate::proxy::request::RequestLine;

/// Bytes read per relay turn.
pub const RELAY_BUFFER_SIZE: usize = 4096;

/// Failures a single connection can run into. All of them are recovered by
/// the pool worker: logged, both sockets dropped, worker keeps running.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to read request line: {0}")]
    ReadRequest(#[source] io::Error),

    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("connect to {host}:{port} timed out after {timeout_secs}s")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout_secs: u64,
    },

    #[error("relay failed: {0}")]
    Relay(#[source] io::Error),

    #[error("failed to write cached response: {0}")]
    WriteCached(#[source] io::Error),
}

/// Serve one client connection end-to-end.
///
/// `cache` is `None` when caching is disabled; the request is then always
/// relayed to the origin.
pub async fn handle_connection(
    client: TcpStream,
    cache: Option<Arc<LruCache>>,
    connect_timeout: Duration,
) -> Result<(), HandlerError> {
    let (client_read, mut client_write) = client.into_split();
    let mut client_read = BufReader::new(client_read);

    let mut line = String::new();
    let read = client_read
        .read_line(&mut line)
        .await
        .map_err(HandlerError::ReadRequest)?;
    if read == 0 {
        // client connected and left
        return Ok(());
    }

    match RequestLine::verb_of(&line) {
        Some("GET") => {}
        Some("CONNECT") => return tunnel(&line),
        Some(verb) => {
            tracing::debug!(verb, "dropping unsupported verb");
            return Ok(());
        }
        None => {
            tracing::debug!("dropping malformed request line");
            return Ok(());
        }
    }

    let request = match RequestLine::parse(&line) {
        Some(request) => request,
        None => {
            tracing::debug!(line = line.trim_end(), "dropping unparsable request line");
            return Ok(());
        }
    };

    if let Some(cache) = cache.as_deref() {
        if let Some(body) = cache.get(&request.url) {
            if request.is_cacheable() {
                client_write
                    .write_all(&body)
                    .await
                    .map_err(HandlerError::WriteCached)?;
                client_write
                    .flush()
                    .await
                    .map_err(HandlerError::WriteCached)?;
                metrics::record_cache_hit(body.len());
                tracing::info!(url = %request.url, bytes = body.len(), "served from cache");
                return Ok(());
            }
        } else {
            metrics::record_cache_miss();
        }
    }

    let origin = match timeout(
        connect_timeout,
        TcpStream::connect((request.host.as_str(), request.port)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(HandlerError::Connect {
                host: request.host,
                port: request.port,
                source,
            });
        }
        Err(_) => {
            return Err(HandlerError::ConnectTimeout {
                host: request.host,
                port: request.port,
                timeout_secs: connect_timeout.as_secs(),
            });
        }
    };
    tracing::debug!(url = %request.url, host = %request.host, port = request.port, "forwarding to origin");

    let (mut origin_read, mut origin_write) = origin.into_split();
    origin_write
        .write_all(request.raw.as_bytes())
        .await
        .map_err(HandlerError::Relay)?;
    origin_write.flush().await.map_err(HandlerError::Relay)?;

    let response = relay(
        &mut client_read,
        &mut client_write,
        &mut origin_read,
        &mut origin_write,
    )
    .await?;

    if let Some(cache) = cache.as_deref() {
        if request.is_cacheable() {
            let bytes = response.len();
            let inserted = cache.put(&request.url, response.freeze());
            if inserted {
                metrics::record_cache_insert(bytes);
            }
            tracing::debug!(url = %request.url, bytes, inserted, "cache insert attempted");
        }
    }
    Ok(())
}

/// Shuttle bytes both ways until either side reaches end-of-stream.
///
/// Returns everything the origin sent, for the caller's cache decision.
async fn relay(
    client_read: &mut BufReader<OwnedReadHalf>,
    client_write: &mut OwnedWriteHalf,
    origin_read: &mut OwnedReadHalf,
    origin_write: &mut OwnedWriteHalf,
) -> Result<BytesMut, HandlerError> {
    let mut response = BytesMut::new();
    let mut client_buf = [0u8; RELAY_BUFFER_SIZE];
    let mut origin_buf = [0u8; RELAY_BUFFER_SIZE];
    loop {
        tokio::select! {
            read = client_read.read(&mut client_buf) => {
                let count = read.map_err(HandlerError::Relay)?;
                if count == 0 {
                    break;
                }
                origin_write
                    .write_all(&client_buf[..count])
                    .await
                    .map_err(HandlerError::Relay)?;
                origin_write.flush().await.map_err(HandlerError::Relay)?;
            }
            read = origin_read.read(&mut origin_buf) => {
                let count = read.map_err(HandlerError::Relay)?;
                if count == 0 {
                    break;
                }
                client_write
                    .write_all(&origin_buf[..count])
                    .await
                    .map_err(HandlerError::Relay)?;
                client_write.flush().await.map_err(HandlerError::Relay)?;
                response.extend_from_slice(&origin_buf[..count]);
            }
        }
    }
    metrics::record_relay_complete(response.len());
    Ok(response)
}

/// Extension point for CONNECT tunnelling. Not implemented: the connection
/// closes without a response.
fn tunnel(line: &str) -> Result<(), HandlerError> {
    tracing::debug!(line = line.trim_end(), "CONNECT tunnelling not supported; closing");
    Ok(())
}
