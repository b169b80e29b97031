//! # Wharf Router
//!
//! The middleware pipeline and routing layer of Wharf: compiled path
//! patterns, an ordered handler chain with a `next()` continuation, the
//! framework's default response middleware (status defaults, keep-alive
//! mirroring, deflate compression), CORS, request logging, a per-path
//! circuit breaker and a static file provider.
//!
//! Handlers own the request/response pair and pass it through the chain by
//! value; calling `next` consumes it, so a middleware can invoke its
//! continuation at most once by construction.
//!
//! ```no_run
//! use wharf_router::{endpoint, Router};
//!
//! let mut router = Router::new();
//! router
//!     .get("/api/:service/:method", endpoint(|req, mut resp| Box::pin(async move {
//!         let service = req.path_param("service").unwrap_or("").to_string();
//!         resp.set_content(format!("service {service}"), "text/plain");
//!         Ok((req, resp))
//!     })))
//!     .unwrap();
//! ```

pub mod middleware;
pub mod pattern;
pub mod router;
pub mod static_files;

pub use middleware::{cors, logger, CircuitBreaker};
pub use pattern::{PathPattern, PatternError};
pub use router::{endpoint, Flow, HandlerError, HandlerFuture, Middleware, Next, Router};
pub use static_files::StaticFileProvider;
