//! `fetch`: pooled, retrying HTTP requests.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

use wharf_http::{codec, HttpError, Response, USER_AGENT};

use crate::pool::{ConnectionPool, PooledConn};
use crate::{ClientError, Result};

/// Options for one fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Stream timeout in seconds covering the whole exchange.
    pub timeout: i64,
    /// Return the connection to the pool after a completed exchange.
    pub keepalive: bool,
    /// Attempt cap for reuse-aware retry.
    pub max_retry: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: 30,
            keepalive: false,
            max_retry: 5,
        }
    }
}

impl FetchOptions {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_timeout(mut self, seconds: i64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_max_retry(mut self, max_retry: usize) -> Self {
        self.max_retry = max_retry;
        self
    }
}

/// An HTTP client sharing one connection pool.
pub struct Client {
    pool: Arc<ConnectionPool>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(ConnectionPool::default()),
        }
    }

    pub fn with_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Perform one HTTP exchange.
    ///
    /// A failure on a connection that had already served a round-trip is
    /// taken as an idle close by the peer and retried on a fresh
    /// connection, up to `max_retry` attempts; retry is limited to
    /// idempotent methods. A failure on a newly established connection
    /// surfaces immediately.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<Response> {
        let parsed = Url::parse(url)?;
        let tls = match parsed.scheme() {
            "http" => false,
            "https" => true,
            other => {
                return Err(ClientError::UnsupportedScheme {
                    scheme: other.to_string(),
                })
            }
        };
        if tls && !cfg!(feature = "tls") {
            return Err(ClientError::TlsDisabled);
        }
        let host = parsed.host_str().ok_or(ClientError::MissingHost)?.to_string();
        let port = parsed.port().unwrap_or(if tls { 443 } else { 80 });

        // raw path + query, untouched
        let mut target = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            target.push('?');
            target.push_str(query);
        }

        let idempotent = matches!(
            options.method,
            Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
        );

        let mut last_error: Option<HttpError> = None;
        for attempt in 0..options.max_retry.max(1) {
            let mut conn = self.pool.acquire(&host, port, tls).await?;
            let reused = !conn.is_first_use();

            match round_trip(&mut conn, &host, port, &target, &options).await {
                Ok(response) => {
                    if options.keepalive {
                        self.pool.release(conn);
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if reused && idempotent {
                        // the peer likely closed the idle connection
                        tracing::debug!(attempt, "retrying after reuse failure: {error}");
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error.into());
                }
            }
        }

        Err(last_error
            .unwrap_or(HttpError::ConnectionClosed)
            .into())
    }

    /// POST multipart form parts. See [`crate::http_upload`].
    pub async fn upload(
        &self,
        url: &str,
        parts: &[wharf_http::FormPart],
    ) -> Result<Response> {
        crate::upload::upload(self, url, parts).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

async fn round_trip(
    conn: &mut PooledConn,
    host: &str,
    port: u16,
    target: &str,
    options: &FetchOptions,
) -> wharf_http::Result<Response> {
    let mut headers = HeaderMap::new();
    let host_value = if port == 80 || port == 443 {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };
    headers.insert(
        http::header::HOST,
        HeaderValue::from_str(&host_value)
            .map_err(|e| HttpError::Parse {
                message: format!("bad host: {e}"),
            })?,
    );
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        http::header::USER_AGENT,
        HeaderValue::from_static(USER_AGENT),
    );
    if !options.keepalive {
        headers.insert(
            http::header::CONNECTION,
            HeaderValue::from_static("close"),
        );
    }
    for (name, value) in options.headers.iter() {
        headers.insert(name.clone(), value.clone());
    }

    let exchange = async {
        codec::write_request(
            &mut conn.stream,
            &options.method,
            target,
            &headers,
            &options.body,
        )
        .await?;
        codec::read_response(
            &mut conn.stream,
            &mut conn.buf,
            options.method == Method::HEAD,
        )
        .await
    };

    if options.timeout <= 0 {
        exchange.await
    } else {
        match tokio::time::timeout(Duration::from_secs(options.timeout as u64), exchange).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout),
        }
    }
}
