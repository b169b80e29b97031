//! # Wharf
//!
//! An embeddable application toolkit built around a cooperative-concurrency
//! HTTP/WebSocket runtime.
//!
//! Wharf bundles six focused crates behind one facade:
//!
//! - [`core`](wharf_core): the executor pool, timers, `async_sleep`,
//!   cross-executor `schedule` and cancellation tokens
//! - [`sync`](wharf_sync): condition variable, counting semaphore, batching
//!   MPSC channel and oneshot channel for cooperative tasks
//! - [`http`](wharf_http): the request/response model, HTTP/1.1 codec and
//!   multipart helpers
//! - [`router`](wharf_router): the middleware pipeline, compiled path
//!   patterns and the static file provider
//! - [`server`](wharf_server): accept loop, session state machine and
//!   WebSocket routes
//! - [`client`](wharf_client): pooled `fetch` with reuse-aware retry and
//!   multipart upload
//!
//! ## A complete server
//!
//! ```no_run
//! use wharf::prelude::*;
//!
//! fn main() {
//!     let pool = ExecutorPool::new();
//!     pool.spawn(async {
//!         let mut server = Server::new(ServerConfig::default());
//!         server.serve_static("/public", "/data/www/html");
//!         server
//!             .router()
//!             .get("/api/a", endpoint(|req, mut resp| Box::pin(async move {
//!                 async_sleep(1000).await;
//!                 resp.set_content("<p1>hello,world</p1>", "text/html");
//!                 Ok((req, resp))
//!             })))
//!             .unwrap();
//!         server.start("0.0.0.0", 8088).await.unwrap();
//!     });
//!     pool.run(4, true);
//! }
//! ```

pub use wharf_client as client;
pub use wharf_core as core;
pub use wharf_http as http;
pub use wharf_router as router;
pub use wharf_server as server;
pub use wharf_sync as sync;

/// The commonly used surface in one import.
pub mod prelude {
    pub use wharf_client::{fetch, http_upload, Client, FetchOptions};
    pub use wharf_core::{async_sleep, schedule, CancelToken, ExecutorPool, TimerHandle};
    pub use wharf_http::{FormPart, Request, Response};
    pub use wharf_router::{cors, endpoint, logger, Middleware, Next, Router, StaticFileProvider};
    pub use wharf_server::{Server, ServerConfig};
    pub use wharf_sync::{CondVar, Semaphore};
}
