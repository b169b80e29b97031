//! # Wharf Client
//!
//! An HTTP/1.1 client with a per-host keep-alive connection pool, reuse-
//! aware retry and a multipart upload helper.
//!
//! ```no_run
//! use wharf_client::{fetch, FetchOptions};
//!
//! # async fn demo() -> wharf_client::Result<()> {
//! let response = fetch("http://example.com/api/list", FetchOptions::default()).await?;
//! println!("status {}", response.status);
//! # Ok(())
//! # }
//! ```
//!
//! Connections live in the pool only between exchanges; an in-flight
//! request owns its connection exclusively and either returns it (under
//! `keepalive`) or drops it.

mod fetch;
mod pool;
mod stream;
mod upload;

use thiserror::Error;

pub use fetch::{Client, FetchOptions};
pub use pool::{ConnectionPool, PoolConfig, PooledConn};
pub use stream::ClientStream;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("url has no host")]
    MissingHost,

    #[error("unsupported scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("https requested but the `tls` feature is not enabled")]
    TlsDisabled,

    #[error("tls error: {message}")]
    Tls { message: String },

    #[error(transparent)]
    Http(#[from] wharf_http::HttpError),
}

lazy_static::lazy_static! {
    static ref DEFAULT_CLIENT: Client = Client::new();
}

/// Fetch a URL with the process-default client.
pub async fn fetch(url: &str, options: FetchOptions) -> Result<wharf_http::Response> {
    DEFAULT_CLIENT.fetch(url, options).await
}

/// Upload multipart form parts with the process-default client.
pub async fn http_upload(
    url: &str,
    parts: &[wharf_http::FormPart],
) -> Result<wharf_http::Response> {
    DEFAULT_CLIENT.upload(url, parts).await
}

/// Drop every idle connection held by the process-default client.
pub fn cleanup() {
    DEFAULT_CLIENT.pool().cleanup();
}
