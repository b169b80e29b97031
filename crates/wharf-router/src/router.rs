//! Ordered middleware chain with a consumed-by-value `next()` continuation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;

use wharf_http::{Request, Response};

use crate::middleware::auto_headers;
use crate::pattern::{PathPattern, PatternError};

/// Error type handlers may fail with; the message becomes the 500 body.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The request/response pair threaded through the chain by value.
pub type Flow = std::result::Result<(Request, Response), HandlerError>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Flow> + Send>>;

/// A participant in the middleware pipeline.
///
/// Implementations either invoke `next.run(req, resp)` exactly once and
/// continue with its result, or return without calling it (short-circuit).
/// `Next` is consumed by value, so a double invocation does not compile.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, resp: Response, next: Next) -> HandlerFuture;
}

impl<F> Middleware for F
where
    F: Fn(Request, Response, Next) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, req: Request, resp: Response, next: Next) -> HandlerFuture {
        self(req, resp, next)
    }
}

/// Continuation over the remainder of the chain.
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl Next {
    /// Run the rest of the chain. Past the last handler this resolves to
    /// the pair unchanged.
    pub fn run(self, req: Request, resp: Response) -> HandlerFuture {
        match self.chain.get(self.index) {
            Some(handler) => {
                let handler = handler.clone();
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                };
                handler.handle(req, resp, next)
            }
            None => Box::pin(async move { Ok((req, resp)) }),
        }
    }
}

/// Lift a two-argument handler into the middleware form. The continuation
/// is dropped: an endpoint terminates its branch of the chain.
pub fn endpoint<F>(f: F) -> impl Middleware
where
    F: Fn(Request, Response) -> HandlerFuture + Send + Sync + 'static,
{
    EndpointFn(f)
}

struct EndpointFn<F>(F);

impl<F> Middleware for EndpointFn<F>
where
    F: Fn(Request, Response) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, req: Request, resp: Response, _next: Next) -> HandlerFuture {
        (self.0)(req, resp)
    }
}

/// A method + compiled-template filter around a handler.
struct Route {
    method: Option<Method>,
    pattern: PathPattern,
    handler: Arc<dyn Middleware>,
}

impl Middleware for Route {
    fn handle(&self, mut req: Request, resp: Response, next: Next) -> HandlerFuture {
        if let Some(method) = &self.method {
            if req.method != *method {
                return next.run(req, resp);
            }
        }
        match self.pattern.match_path(&req.path) {
            Some(params) => {
                req.path_params = Some(params);
                self.handler.handle(req, resp, next)
            }
            None => next.run(req, resp),
        }
    }
}

/// The ordered handler chain.
///
/// A fresh router pre-installs the framework middleware that owns response
/// defaults and post-processing; user middleware and routes append behind
/// it in insertion order.
pub struct Router {
    handlers: Vec<Arc<dyn Middleware>>,
    chain: Arc<[Arc<dyn Middleware>]>,
}

impl Router {
    pub fn new() -> Self {
        let mut router = Self {
            handlers: Vec::with_capacity(8),
            chain: Arc::from(Vec::new().into_boxed_slice()),
        };
        router.with(auto_headers());
        router
    }

    /// Append a middleware.
    pub fn with(&mut self, middleware: impl Middleware) -> &mut Self {
        self.handlers.push(Arc::new(middleware));
        self.chain = self.handlers.clone().into();
        self
    }

    /// Append a route for `method` (`None` = any method) on `template`.
    pub fn route(
        &mut self,
        method: Option<Method>,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        let route = Route {
            method,
            pattern: PathPattern::compile(template, true)?,
            handler: Arc::new(handler),
        };
        Ok(self.with(route))
    }

    pub fn get(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(Some(Method::GET), template, handler)
    }

    pub fn post(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(Some(Method::POST), template, handler)
    }

    pub fn put(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(Some(Method::PUT), template, handler)
    }

    pub fn delete(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(Some(Method::DELETE), template, handler)
    }

    pub fn options(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(Some(Method::OPTIONS), template, handler)
    }

    pub fn head(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(Some(Method::HEAD), template, handler)
    }

    /// Route matching any method.
    pub fn any(
        &mut self,
        template: &str,
        handler: impl Middleware,
    ) -> Result<&mut Self, PatternError> {
        self.route(None, template, handler)
    }

    /// Run the chain over a request.
    ///
    /// A failed handler does not escape: the error message becomes the body
    /// of a 500 response that still mirrors version and keep-alive.
    pub async fn dispatch(&self, req: Request) -> Response {
        let version = req.version;
        let keep_alive = req.keep_alive();

        let next = Next {
            chain: self.chain.clone(),
            index: 0,
        };
        match next.run(req, Response::new()).await {
            Ok((_req, resp)) => resp,
            Err(error) => {
                tracing::debug!("handler failed: {error}");
                let mut resp = Response::new();
                resp.version = version;
                resp.set_keep_alive(keep_alive);
                resp.status = http::StatusCode::INTERNAL_SERVER_ERROR;
                resp.body = error.to_string().into();
                resp.set_header(http::header::SERVER, wharf_http::SERVER_NAME);
                resp.set_header(http::header::CONTENT_TYPE, "text/plain");
                resp.prepare_payload();
                resp
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
