//! Per-host keep-alive connection pool.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use bytes::BytesMut;
use tokio::net::TcpStream;

use crate::stream::ClientStream;
use crate::{ClientError, Result};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle connections kept per `host:port`; returns past the cap drop the
    /// connection instead.
    pub max_idle_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 128,
        }
    }
}

/// One pooled connection.
///
/// Owned exclusively by either the pool (idle) or the in-flight request,
/// never both. `first_use` stays `true` until a round-trip completes and
/// the connection is returned; the retry logic keys off it.
pub struct PooledConn {
    pub(crate) stream: ClientStream,
    pub(crate) key: String,
    pub(crate) first_use: bool,
    /// Read buffer carried with the connection so bytes the peer pipelined
    /// behind a response survive reuse.
    pub(crate) buf: BytesMut,
}

impl PooledConn {
    pub fn is_first_use(&self) -> bool {
        self.first_use
    }
}

/// Thread-safe pool of idle connections keyed by `host:port`.
///
/// Queues are FIFO both ways: acquire pops the front, release pushes the
/// back.
pub struct ConnectionPool {
    idle: Mutex<HashMap<String, VecDeque<PooledConn>>>,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Hand out an idle connection for the host, or resolve and establish a
    /// fresh one (`first_use = true`).
    pub async fn acquire(&self, host: &str, port: u16, tls: bool) -> Result<PooledConn> {
        let key = pool_key(host, port);
        {
            let mut idle = self.idle.lock().expect("pool poisoned");
            if let Some(queue) = idle.get_mut(&key) {
                if let Some(conn) = queue.pop_front() {
                    tracing::debug!(%key, "reusing pooled connection");
                    return Ok(conn);
                }
            }
        }

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(wharf_http::HttpError::from)?;
        let stream = if tls {
            connect_tls(host, tcp).await?
        } else {
            ClientStream::Plain(tcp)
        };
        tracing::debug!(%key, "established new connection");
        Ok(PooledConn {
            stream,
            key,
            first_use: true,
            buf: BytesMut::with_capacity(8 * 1024),
        })
    }

    /// Return a connection after a completed exchange. Past the per-host
    /// cap the connection is dropped instead.
    pub fn release(&self, mut conn: PooledConn) {
        conn.first_use = false;
        let mut idle = self.idle.lock().expect("pool poisoned");
        let queue = idle.entry(conn.key.clone()).or_default();
        if queue.len() < self.config.max_idle_per_host {
            queue.push_back(conn);
        }
    }

    /// Drop every idle connection. In-flight requests are untouched.
    pub fn cleanup(&self) {
        self.idle.lock().expect("pool poisoned").clear();
    }

    /// Idle connections currently pooled for a host.
    pub fn idle_count(&self, host: &str, port: u16) -> usize {
        self.idle
            .lock()
            .expect("pool poisoned")
            .get(&pool_key(host, port))
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

fn pool_key(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

#[cfg(feature = "tls")]
async fn connect_tls(host: &str, tcp: TcpStream) -> Result<ClientStream> {
    use std::sync::Arc;
    use tokio_rustls::rustls::pki_types::ServerName;
    use tokio_rustls::rustls::{ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;

    lazy_static::lazy_static! {
        static ref TLS_CONFIG: Arc<ClientConfig> = {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        };
    }

    let server_name = ServerName::try_from(host.to_string()).map_err(|e| ClientError::Tls {
        message: format!("invalid server name: {e}"),
    })?;
    let connector = TlsConnector::from(TLS_CONFIG.clone());
    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| ClientError::Tls {
            message: e.to_string(),
        })?;
    Ok(ClientStream::Tls(Box::new(stream)))
}

#[cfg(not(feature = "tls"))]
async fn connect_tls(_host: &str, _tcp: TcpStream) -> Result<ClientStream> {
    Err(ClientError::TlsDisabled)
}
