//! # Wharf Server
//!
//! The HTTP/1.1 and WebSocket server of the Wharf toolkit.
//!
//! A [`Server`] owns a router, a WebSocket route table and an error hook.
//! [`Server::start`] binds the listener and spawns the accept loop on the
//! current scheduler; every accepted connection becomes one session task
//! that parses requests, runs the middleware chain and writes responses
//! until keep-alive ends. Live sessions are bounded by a semaphore sized to
//! the listen backlog.
//!
//! ```no_run
//! use wharf_router::endpoint;
//! use wharf_server::{Server, ServerConfig};
//!
//! # async fn demo() -> Result<(), wharf_server::ServerError> {
//! let mut server = Server::new(ServerConfig::default());
//! server.router().get("/api/a", endpoint(|req, mut resp| Box::pin(async move {
//!     resp.set_content("<p1>hello,world</p1>", "text/html");
//!     Ok((req, resp))
//! }))).unwrap();
//!
//! let handle = server.start("0.0.0.0", 8088).await?;
//! tracing::info!("listening on {}", handle.local_addr());
//! # Ok(())
//! # }
//! ```

mod session;
mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use wharf_http::HttpError;
use wharf_router::{PatternError, Router, StaticFileProvider};
use wharf_sync::Semaphore;

pub use websocket::{WsFuture, WsHandler, WsStream};

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {address}")]
    InvalidAddress { address: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Session error hook. Return `true` to absorb the error; `false` lets it
/// propagate to the accept loop's logging completion.
pub type ErrorCallback = dyn Fn(&HttpError) -> bool + Send + Sync;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen backlog; also bounds concurrently live sessions.
    pub backlog: u32,
    /// Per-read/write timeout in seconds. Non-positive means effectively
    /// infinite.
    pub read_timeout: i64,
    /// Request body cap. `None` removes the bound.
    pub body_limit: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backlog: 128,
            read_timeout: 30,
            body_limit: Some(16 * 1024 * 1024),
        }
    }
}

/// An HTTP/WebSocket application server.
pub struct Server {
    config: ServerConfig,
    router: Router,
    ws_routes: Vec<websocket::WsRoute>,
    on_error: Option<Box<ErrorCallback>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            ws_routes: Vec::new(),
            on_error: None,
        }
    }

    /// The middleware chain requests run through.
    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Mount a static file directory (appends the provider middleware).
    pub fn serve_static(&mut self, mount_point: &str, doc_root: &str) -> &mut Self {
        self.router
            .with(StaticFileProvider::new(mount_point, doc_root));
        self
    }

    /// Register a WebSocket route. The first registered route whose
    /// template accepts the upgrade path owns the connection.
    pub fn websocket(
        &mut self,
        template: &str,
        handler: impl WsHandler,
    ) -> Result<&mut Self> {
        self.ws_routes.push(websocket::WsRoute::new(template, handler)?);
        Ok(self)
    }

    /// Install the session error hook.
    pub fn on_error(&mut self, callback: impl Fn(&HttpError) -> bool + Send + Sync + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    /// Bind and start accepting on the current scheduler.
    pub async fn start(self, host: &str, port: u16) -> Result<ServerHandle> {
        let address: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|_| ServerError::InvalidAddress {
                    address: format!("{host}:{port}"),
                })?;

        let socket = if address.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(address)?;
        let listener = socket.listen(self.config.backlog)?;
        let local_addr = listener.local_addr()?;
        tracing::info!("listening on {local_addr}");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = Arc::new(self);
        let join = tokio::spawn(accept_loop(server, listener, shutdown_rx));

        Ok(ServerHandle {
            local_addr,
            shutdown: shutdown_tx,
            join,
        })
    }
}

/// Handle to a started server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for the accept loop to wind down. Sessions
    /// already running finish on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

async fn accept_loop(
    server: Arc<Server>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let sessions = Arc::new(Semaphore::new(server.config.backlog as usize));

    loop {
        tokio::select! {
            _ = sessions.acquire() => {}
            _ = shutdown.changed() => break,
        }

        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    let server = server.clone();
                    let sessions = sessions.clone();
                    tokio::spawn(async move {
                        let outcome = session::run(&server, stream).await;
                        sessions.release();
                        if let Err(error) = outcome {
                            tracing::error!("error in session: {error}");
                        }
                    });
                }
                Err(error) => {
                    tracing::error!("accept failed: {error}");
                    sessions.release();
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}
